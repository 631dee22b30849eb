use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowgraph_diagram::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Skipped,
  Paused,
  MaxIterReached,
}

impl NodeStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped | NodeStatus::MaxIterReached
    )
  }
}

/// Per-node execution bookkeeping. `exec_count` and `max_iteration` are
/// tracked uniformly for every node type, not just `person_job` (the
/// iteration cap is simply 1 for non-iterating nodes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
  pub node_id: NodeId,
  pub status: NodeStatus,
  pub exec_count: u32,
  pub max_iteration: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ended_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl NodeState {
  pub fn pending(node_id: NodeId, max_iteration: u32) -> Self {
    Self {
      node_id,
      status: NodeStatus::Pending,
      exec_count: 0,
      max_iteration,
      started_at: None,
      ended_at: None,
      error: None,
    }
  }
}
