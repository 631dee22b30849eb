use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowgraph_diagram::{ExecutionId, NodeId};

/// A control message's kind (§6 "Control surface"). An unrecognized kind on
/// the wire deserializes to `Other` rather than failing, so the router can
/// ignore it with a warning instead of rejecting the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
  Pause,
  Resume,
  Abort,
  SkipNode,
  InteractiveResponse,
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
  pub kind: ControlKind,
  pub execution_id: ExecutionId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<NodeId>,
  #[serde(default)]
  pub data: Value,
}
