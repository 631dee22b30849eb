use thiserror::Error;

use flowgraph_diagram::NodeId;
use flowgraph_state::StateError;

#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error("execution state error: {0}")]
  State(#[from] StateError),

  #[error("no ready nodes and none running after {0} poll retries")]
  DeadlockDetected(u32),

  #[error("node {0} exceeded its timeout")]
  NodeTimedOut(NodeId),

  #[error("execution exceeded its overall timeout")]
  ExecutionTimedOut,

  #[error("execution failed: node {0} failed with nothing left to run")]
  ExecutionFailed(NodeId),

  #[error("execution was aborted")]
  Aborted,
}
