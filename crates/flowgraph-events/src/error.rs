use thiserror::Error;

use flowgraph_diagram::ExecutionId;
use flowgraph_state::StateError;

#[derive(Debug, Error)]
pub enum EventError {
  #[error("no events recorded for execution {0}")]
  UnknownExecution(ExecutionId),

  #[error("replay failed: {0}")]
  Replay(#[from] StateError),
}
