use thiserror::Error;

use flowgraph_diagram::NodeId;

#[derive(Debug, Error)]
pub enum StateError {
  #[error("node not found in execution state: {0}")]
  NodeNotFound(NodeId),

  #[error("node {0} cannot transition to {1:?} from its current status")]
  InvalidTransition(NodeId, crate::node_state::NodeStatus),

  #[error("node {0} completed without recording any output")]
  MissingOutput(NodeId),
}
