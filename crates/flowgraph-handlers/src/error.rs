use thiserror::Error;

use flowgraph_diagram::NodeType;

#[derive(Debug, Error)]
pub enum HandlerError {
  #[error("no handler registered for node type {0:?}")]
  NoHandler(NodeType),

  #[error("handler for {node_type:?} requires service \"{name}\", which the bundle does not provide")]
  MissingService { node_type: NodeType, name: &'static str },

  #[error("node has the wrong shape for its declared type: {0}")]
  InvalidShape(String),

  #[error("handler failed: {0}")]
  Failed(String),

  #[error("handler timed out")]
  TimedOut,

  #[error("handler was cancelled")]
  Cancelled,
}
