use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use flowgraph_diagram::NodeId;

/// One upstream dependency of a node, carrying the variable name it is
/// expected to surface under (edge label, or source output port, or the
/// generic `"flow"` placeholder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDependency {
  pub source: NodeId,
  pub variable: String,
}

/// Derived execution-planning facts, cached at compile time so the
/// scheduler and input resolver never recompute them per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHints {
  pub start_nodes: Vec<NodeId>,
  pub person_nodes: HashMap<NodeId, String>,
  pub node_dependencies: HashMap<NodeId, Vec<NodeDependency>>,
}
