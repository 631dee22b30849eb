use std::collections::HashMap;

use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::NodeType;
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Handlers keyed by the node type they execute. Only one handler may be
/// registered per type; registering a second replaces the first.
#[derive(Default)]
pub struct HandlerRegistry {
  handlers: HashMap<NodeType, Box<dyn NodeHandler>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, node_type: NodeType, handler: Box<dyn NodeHandler>) {
    self.handlers.insert(node_type, handler);
  }

  pub fn get(&self, node_type: NodeType) -> Option<&dyn NodeHandler> {
    self.handlers.get(&node_type).map(|h| h.as_ref())
  }

  /// `dispatch` per §4.8: look up the handler, check required services are
  /// present, invoke it, and return its `NodeOutput` unchanged. The
  /// registry never touches execution state; the caller (the scheduler)
  /// is responsible for recording the result.
  pub async fn dispatch(
    &self,
    node: &CompiledNode,
    inputs: &Map<String, Value>,
    services: &ServiceBundle,
  ) -> Result<NodeOutput, HandlerError> {
    let handler = self.get(node.node_type).ok_or(HandlerError::NoHandler(node.node_type))?;
    tracing::debug!(node_id = %node.id, node_type = ?node.node_type, "dispatching node");

    for name in handler.required_services() {
      if !services.has(*name) {
        return Err(HandlerError::MissingService {
          node_type: node.node_type,
          name: *name,
        });
      }
    }

    handler.execute(node, inputs, services).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use flowgraph_diagram::{CodeLanguage, NodeData, NodeId};

  struct AlwaysFails;

  #[async_trait]
  impl NodeHandler for AlwaysFails {
    fn required_services(&self) -> &'static [&'static str] {
      &["llm"]
    }

    async fn execute(&self, _: &CompiledNode, _: &Map<String, Value>, _: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
      Ok(NodeOutput::value(Value::Null))
    }
  }

  fn code_job_node() -> CompiledNode {
    CompiledNode {
      id: NodeId::from("n1"),
      node_type: NodeType::CodeJob,
      data: NodeData::CodeJob {
        language: CodeLanguage::Python,
        code: "pass".into(),
        timeout_ms: None,
      },
      max_iteration: 1,
    }
  }

  #[tokio::test]
  async fn dispatch_reports_unregistered_type() {
    let registry = HandlerRegistry::new();
    let err = registry
      .dispatch(&code_job_node(), &Map::new(), &ServiceBundle::default())
      .await
      .unwrap_err();
    assert!(matches!(err, HandlerError::NoHandler(NodeType::CodeJob)));
  }

  #[tokio::test]
  async fn dispatch_rejects_missing_required_service() {
    let mut registry = HandlerRegistry::new();
    registry.register(NodeType::CodeJob, Box::new(AlwaysFails));
    let err = registry
      .dispatch(&code_job_node(), &Map::new(), &ServiceBundle::default())
      .await
      .unwrap_err();
    assert!(matches!(err, HandlerError::MissingService { name: "llm", .. }));
  }
}
