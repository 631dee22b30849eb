mod diagram;
mod edge;
mod error;
mod graph;
mod hints;
mod node;

pub use diagram::ExecutableDiagram;
pub use edge::{Edge, EdgeMetadata};
pub use error::CompiledError;
pub use graph::Graph;
pub use hints::{ExecutionHints, NodeDependency};
pub use node::CompiledNode;
