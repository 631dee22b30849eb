use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::{DbOperation, NodeData};
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Reads, writes, or appends a keyed variable through the `memory` service
/// (§3: `db → variable` default content type).
pub struct DbHandler;

#[async_trait]
impl NodeHandler for DbHandler {
  fn required_services(&self) -> &'static [&'static str] {
    &["memory"]
  }

  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, services: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::Db { operation, collection, key } = &node.data else {
      return Err(HandlerError::InvalidShape("db handler received a non-db node".into()));
    };

    let memory = services.memory.as_ref().ok_or(HandlerError::MissingService {
      node_type: node.node_type,
      name: "memory",
    })?;
    let collection = collection.as_deref().unwrap_or("default");
    let key = key.as_deref().unwrap_or("default");

    let value = match operation {
      DbOperation::Read => memory.get(collection, key).await?.unwrap_or(Value::Null),
      DbOperation::Write => {
        let value = inputs.get("default").cloned().unwrap_or(Value::Null);
        memory.put(collection, key, value.clone()).await?;
        value
      }
      DbOperation::Append => {
        let value = inputs.get("default").cloned().unwrap_or(Value::Null);
        memory.append(collection, key, value.clone()).await?;
        value
      }
    };

    Ok(NodeOutput::value(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::InMemoryMemoryService;
  use flowgraph_diagram::NodeId;
  use serde_json::json;
  use std::sync::Arc;

  fn node(operation: DbOperation) -> CompiledNode {
    CompiledNode {
      id: NodeId::from("d"),
      node_type: flowgraph_diagram::NodeType::Db,
      data: NodeData::Db {
        operation,
        collection: Some("c".into()),
        key: Some("k".into()),
      },
      max_iteration: 1,
    }
  }

  fn bundle_with_memory() -> ServiceBundle {
    ServiceBundle {
      memory: Some(Arc::new(InMemoryMemoryService::default())),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn write_then_read_round_trips() {
    let services = bundle_with_memory();
    let mut inputs = Map::new();
    inputs.insert("default".into(), json!("hello"));
    DbHandler.execute(&node(DbOperation::Write), &inputs, &services).await.unwrap();

    let output = DbHandler.execute(&node(DbOperation::Read), &Map::new(), &services).await.unwrap();
    assert_eq!(output.value_ref(), &json!("hello"));
  }

  #[tokio::test]
  async fn missing_memory_service_is_reported() {
    let err = DbHandler
      .execute(&node(DbOperation::Read), &Map::new(), &ServiceBundle::default())
      .await
      .unwrap_err();
    assert!(matches!(err, HandlerError::MissingService { name: "memory", .. }));
  }
}
