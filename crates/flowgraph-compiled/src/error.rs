use thiserror::Error;

use flowgraph_diagram::NodeId;

#[derive(Debug, Error)]
pub enum CompiledError {
  #[error("node not found: {0}")]
  NodeNotFound(NodeId),

  #[error("edge {edge} references unknown {endpoint}: {node}")]
  DanglingEdge {
    edge: String,
    endpoint: &'static str,
    node: NodeId,
  },

  #[error("nodes missing from execution order: {0:?}")]
  IncompleteOrder(Vec<NodeId>),

  #[error("execution order contains unknown node ids: {0:?}")]
  UnknownInOrder(Vec<NodeId>),

  #[error("diagram has no start node")]
  NoStartNode,
}
