use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::NodeData;
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Produces the diagram's entry value. A `start` node has no incoming
/// edges, so the scheduler seeds its resolved inputs from the execution's
/// `variables` map before dispatch; this handler just picks a single value
/// out of whatever it was given (§3, §6 "Scheduler input").
pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, _: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::Start { trigger_payload } = &node.data else {
      return Err(HandlerError::InvalidShape("start handler received a non-start node".into()));
    };

    let value = if let Some(v) = inputs.get("default") {
      v.clone()
    } else if inputs.len() == 1 {
      inputs.values().next().cloned().unwrap_or(Value::Null)
    } else if !inputs.is_empty() {
      Value::Object(inputs.clone())
    } else if let Some(payload) = trigger_payload {
      payload.clone()
    } else {
      Value::Null
    };

    Ok(NodeOutput::value(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_diagram::NodeId;
  use serde_json::json;

  fn node(trigger_payload: Option<Value>) -> CompiledNode {
    CompiledNode {
      id: NodeId::from("s"),
      node_type: flowgraph_diagram::NodeType::Start,
      data: NodeData::Start { trigger_payload },
      max_iteration: 1,
    }
  }

  #[tokio::test]
  async fn prefers_seeded_default_input() {
    let mut inputs = Map::new();
    inputs.insert("default".into(), json!("hello"));
    let output = StartHandler.execute(&node(None), &inputs, &ServiceBundle::default()).await.unwrap();
    assert_eq!(output.value_ref(), &json!("hello"));
  }

  #[tokio::test]
  async fn falls_back_to_trigger_payload() {
    let output = StartHandler
      .execute(&node(Some(json!("triggered"))), &Map::new(), &ServiceBundle::default())
      .await
      .unwrap();
    assert_eq!(output.value_ref(), &json!("triggered"));
  }
}
