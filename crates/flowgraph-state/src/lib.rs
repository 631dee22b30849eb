mod error;
mod node_state;
mod output;
mod state;

pub use error::StateError;
pub use node_state::{NodeState, NodeStatus};
pub use output::NodeOutput;
pub use state::{ExecutionState, ExecutionStatus, TokenUsage};
