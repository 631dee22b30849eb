use thiserror::Error;

use crate::ids::NodeId;

#[derive(Debug, Error)]
pub enum DiagramError {
  #[error("malformed handle reference: {0:?}")]
  MalformedHandleRef(String),

  #[error("arrow {arrow} references unknown node {node}")]
  UnknownNode { arrow: String, node: NodeId },

  #[error("duplicate node id: {0}")]
  DuplicateNodeId(NodeId),

  #[error("duplicate handle name {handle:?} on node {node} ({direction})")]
  DuplicateHandle {
    node: NodeId,
    handle: String,
    direction: &'static str,
  },

  #[error("diagram has no start node")]
  NoStartNode,

  #[error("failed to parse diagram: {0}")]
  Parse(#[from] serde_json::Error),
}
