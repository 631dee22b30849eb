use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowgraph_diagram::{ExecutionId, NodeId};

/// Event kinds an execution can emit (§4.9). `NodeRunning` and
/// `InteractivePrompt`/`InteractiveResponse` are progress-only: replay
/// treats them as no-ops since they don't change terminal node/execution
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  ExecutionStarted,
  NodeStarted,
  NodeRunning,
  NodeCompleted,
  NodeFailed,
  NodeSkipped,
  NodePaused,
  InteractivePrompt,
  InteractiveResponse,
  ExecutionCompleted,
  ExecutionFailed,
  ExecutionAborted,
  StateChanged,
}

impl EventKind {
  /// A `node_running` or other progress-only event the router may drop
  /// under backpressure before it touches a terminal event (§4.10).
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      EventKind::NodeCompleted
        | EventKind::NodeFailed
        | EventKind::NodeSkipped
        | EventKind::ExecutionCompleted
        | EventKind::ExecutionFailed
        | EventKind::ExecutionAborted
    )
  }
}

/// One entry in an execution's append-only log (§4.9): `{execution_id,
/// sequence, kind, node_id?, timestamp, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub execution_id: ExecutionId,
  pub sequence: u64,
  pub kind: EventKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<NodeId>,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub data: Value,
}
