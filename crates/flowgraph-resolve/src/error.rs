use thiserror::Error;

use flowgraph_diagram::NodeId;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("node {0} not found in compiled diagram")]
  NodeNotFound(NodeId),
}
