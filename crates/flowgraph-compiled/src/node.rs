use serde::{Deserialize, Serialize};

use flowgraph_diagram::{DomainNode, NodeData, NodeId, NodeType};

/// A node after compilation. Carries the authored node data unchanged;
/// compilation only adds derived, execution-relevant facts (max
/// iteration count, type tag) so the scheduler and state store never
/// need to re-inspect `NodeData` variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledNode {
  pub id: NodeId,
  pub node_type: NodeType,
  pub data: NodeData,
  pub max_iteration: u32,
}

impl CompiledNode {
  pub fn from_domain(node: &DomainNode) -> Self {
    Self {
      id: node.id.clone(),
      node_type: node.node_type(),
      max_iteration: node.data.max_iteration(),
      data: node.data.clone(),
    }
  }
}
