mod arrow;
mod diagram;
mod error;
mod handle;
mod ids;
mod node;
mod transform;

pub use arrow::Arrow;
pub use diagram::{default_handle_names, ApiKeyRef, DomainDiagram, Person};
pub use error::DiagramError;
pub use handle::{parse_handle_ref, Direction, Handle, ParsedHandle};
pub use ids::{ArrowId, ExecutionId, HandleId, NodeId};
pub use node::{
  CodeLanguage, ConditionKind, DbOperation, DomainNode, NodeData, NodeType, Position,
};
pub use transform::{ContentType, TransformRule};
