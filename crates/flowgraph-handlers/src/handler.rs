use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::services::ServiceBundle;

/// Executes one node type against its resolved inputs (§4.8). Implementors
/// are looked up by `NodeType` in a `HandlerRegistry`; the dispatcher
/// invokes at most one handler per node per execution attempt.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  /// Names from `llm`, `file`, `notion`, `memory`, `api_keys` this handler
  /// needs present in the bundle. The dispatcher rejects dispatch before
  /// calling `execute` if any are missing.
  fn required_services(&self) -> &'static [&'static str] {
    &[]
  }

  async fn execute(
    &self,
    node: &CompiledNode,
    inputs: &Map<String, Value>,
    services: &ServiceBundle,
  ) -> Result<NodeOutput, HandlerError>;
}
