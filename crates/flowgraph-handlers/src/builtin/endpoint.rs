use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::NodeData;
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Terminal sink. Passes its `default` input through as the node's output,
/// optionally persisting it via the `file` service when `save_to_file` is
/// set. `file` is declared required only at the instance level, not
/// statically, so a diagram with no file-writing endpoints runs without a
/// `FileService` configured at all.
pub struct EndpointHandler;

#[async_trait]
impl NodeHandler for EndpointHandler {
  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, services: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::Endpoint { save_to_file, file_name } = &node.data else {
      return Err(HandlerError::InvalidShape("endpoint handler received a non-endpoint node".into()));
    };

    let value = inputs.get("default").cloned().unwrap_or(Value::Null);

    if *save_to_file {
      let file = services.file.as_ref().ok_or(HandlerError::MissingService {
        node_type: node.node_type,
        name: "file",
      })?;
      let name = file_name.as_deref().unwrap_or("output.json");
      file.write(name, &value).await?;
    }

    Ok(NodeOutput::value(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_diagram::NodeId;
  use serde_json::json;

  fn node(save_to_file: bool) -> CompiledNode {
    CompiledNode {
      id: NodeId::from("e"),
      node_type: flowgraph_diagram::NodeType::Endpoint,
      data: NodeData::Endpoint {
        save_to_file,
        file_name: None,
      },
      max_iteration: 1,
    }
  }

  #[tokio::test]
  async fn passes_default_input_through() {
    let mut inputs = Map::new();
    inputs.insert("default".into(), json!("hello"));
    let output = EndpointHandler.execute(&node(false), &inputs, &ServiceBundle::default()).await.unwrap();
    assert_eq!(output.value_ref(), &json!("hello"));
  }

  #[tokio::test]
  async fn save_to_file_without_a_file_service_fails() {
    let err = EndpointHandler.execute(&node(true), &Map::new(), &ServiceBundle::default()).await.unwrap_err();
    assert!(matches!(err, HandlerError::MissingService { name: "file", .. }));
  }
}
