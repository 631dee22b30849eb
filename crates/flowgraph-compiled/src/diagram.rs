use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use flowgraph_diagram::{NodeId, NodeType};

use crate::edge::Edge;
use crate::error::CompiledError;
use crate::graph::Graph;
use crate::hints::ExecutionHints;
use crate::node::CompiledNode;

/// Resolved diagram ready for execution (§3): immutable nodes and edges,
/// a calculated execution order, and the indices/hints derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableDiagram {
  nodes: Vec<CompiledNode>,
  edges: Vec<Edge>,
  execution_order: Vec<NodeId>,
  /// Nodes grouped by longest-path depth from any start node (§4.3),
  /// giving the scheduler a FIFO order within a level.
  levels: Vec<Vec<NodeId>>,
  hints: ExecutionHints,
  #[serde(default)]
  metadata: Map<String, Value>,
  #[serde(default)]
  api_keys: HashMap<String, String>,

  #[serde(skip)]
  node_index: HashMap<NodeId, usize>,
  #[serde(skip)]
  graph: Option<Graph>,
}

impl ExecutableDiagram {
  pub fn new(
    nodes: Vec<CompiledNode>,
    edges: Vec<Edge>,
    execution_order: Vec<NodeId>,
    levels: Vec<Vec<NodeId>>,
    metadata: Map<String, Value>,
    api_keys: HashMap<String, String>,
  ) -> Self {
    let node_index: HashMap<NodeId, usize> = nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id.clone(), i))
      .collect();
    let node_ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let graph = Graph::new(&node_ids, &edges);
    let hints = build_execution_hints(&nodes, &graph);

    Self {
      nodes,
      edges,
      execution_order,
      levels,
      hints,
      metadata,
      api_keys,
      node_index,
      graph: Some(graph),
    }
  }

  pub fn nodes(&self) -> &[CompiledNode] {
    &self.nodes
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn execution_order(&self) -> &[NodeId] {
    &self.execution_order
  }

  pub fn levels(&self) -> &[Vec<NodeId>] {
    &self.levels
  }

  pub fn hints(&self) -> &ExecutionHints {
    &self.hints
  }

  pub fn metadata(&self) -> &Map<String, Value> {
    &self.metadata
  }

  pub fn api_keys(&self) -> &HashMap<String, String> {
    &self.api_keys
  }

  pub fn get_node(&self, id: &NodeId) -> Option<&CompiledNode> {
    self.node_index.get(id).map(|&i| &self.nodes[i])
  }

  pub fn nodes_by_type(&self, node_type: NodeType) -> impl Iterator<Item = &CompiledNode> {
    self.nodes.iter().filter(move |n| n.node_type == node_type)
  }

  fn graph(&self) -> &Graph {
    self.graph.as_ref().expect("graph built in ExecutableDiagram::new")
  }

  pub fn outgoing(&self, id: &NodeId) -> &[Edge] {
    self.graph().outgoing(id)
  }

  pub fn incoming(&self, id: &NodeId) -> &[Edge] {
    self.graph().incoming(id)
  }

  pub fn start_nodes(&self) -> impl Iterator<Item = &CompiledNode> {
    self.nodes_by_type(NodeType::Start)
  }

  pub fn end_nodes(&self) -> impl Iterator<Item = &CompiledNode> {
    self.nodes_by_type(NodeType::Endpoint)
  }

  /// Rebuild the derived graph/index after deserialization, since `#[serde(skip)]`
  /// fields are not carried across the wire (used by event replay, §4.9).
  pub fn rehydrate(&mut self) {
    self.node_index = self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id.clone(), i))
      .collect();
    let node_ids: Vec<NodeId> = self.nodes.iter().map(|n| n.id.clone()).collect();
    let graph = Graph::new(&node_ids, &self.edges);
    self.hints = build_execution_hints(&self.nodes, &graph);
    self.graph = Some(graph);
  }

  /// Structural self-check, grounded on the same invariants the compiler
  /// enforces at build time: a start node exists, the execution order is
  /// exactly the node set, and every edge endpoint resolves (§4.4, §8).
  pub fn validate(&self) -> Vec<CompiledError> {
    let mut errors = Vec::new();

    if self.start_nodes().next().is_none() {
      errors.push(CompiledError::NoStartNode);
    }

    let node_ids: HashSet<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();
    let order_ids: HashSet<&NodeId> = self.execution_order.iter().collect();

    let missing: Vec<NodeId> = node_ids
      .iter()
      .filter(|id| !order_ids.contains(*id))
      .map(|id| (*id).clone())
      .collect();
    if !missing.is_empty() {
      errors.push(CompiledError::IncompleteOrder(missing));
    }

    let extra: Vec<NodeId> = order_ids
      .iter()
      .filter(|id| !node_ids.contains(*id))
      .map(|id| (*id).clone())
      .collect();
    if !extra.is_empty() {
      errors.push(CompiledError::UnknownInOrder(extra));
    }

    for edge in &self.edges {
      if !node_ids.contains(&edge.source_node_id) {
        errors.push(CompiledError::DanglingEdge {
          edge: edge.id.to_string(),
          endpoint: "source",
          node: edge.source_node_id.clone(),
        });
      }
      if !node_ids.contains(&edge.target_node_id) {
        errors.push(CompiledError::DanglingEdge {
          edge: edge.id.to_string(),
          endpoint: "target",
          node: edge.target_node_id.clone(),
        });
      }
    }

    errors
  }
}

fn build_execution_hints(nodes: &[CompiledNode], graph: &Graph) -> ExecutionHints {
  let mut hints = ExecutionHints::default();

  for node in nodes {
    if node.node_type == NodeType::Start {
      hints.start_nodes.push(node.id.clone());
    }
    if let flowgraph_diagram::NodeData::PersonJob {
      person_id: Some(person_id),
      ..
    } = &node.data
    {
      hints.person_nodes.insert(node.id.clone(), person_id.clone());
    }
  }

  for node in nodes {
    let deps: Vec<_> = graph
      .incoming(&node.id)
      .iter()
      .map(|edge| {
        let variable = edge
          .source_output
          .clone()
          .or_else(|| edge.metadata.label.clone())
          .unwrap_or_else(|| "flow".to_string());
        crate::hints::NodeDependency {
          source: edge.source_node_id.clone(),
          variable,
        }
      })
      .collect();
    if !deps.is_empty() {
      hints.node_dependencies.insert(node.id.clone(), deps);
    }
  }

  hints
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_diagram::NodeData;

  fn start(id: &str) -> CompiledNode {
    CompiledNode {
      id: NodeId::from(id),
      node_type: NodeType::Start,
      data: NodeData::Start { trigger_payload: None },
      max_iteration: 1,
    }
  }

  fn endpoint(id: &str) -> CompiledNode {
    CompiledNode {
      id: NodeId::from(id),
      node_type: NodeType::Endpoint,
      data: NodeData::Endpoint {
        save_to_file: false,
        file_name: None,
      },
      max_iteration: 1,
    }
  }

  fn edge(id: &str, from: &str, to: &str) -> Edge {
    Edge {
      id: flowgraph_diagram::ArrowId::from(id),
      source_node_id: NodeId::from(from),
      target_node_id: NodeId::from(to),
      source_output: None,
      target_input: None,
      transform: Default::default(),
      metadata: Default::default(),
    }
  }

  #[test]
  fn validate_detects_missing_start() {
    let diagram = ExecutableDiagram::new(
      vec![endpoint("e1")],
      vec![],
      vec![NodeId::from("e1")],
      vec![vec![NodeId::from("e1")]],
      Map::new(),
      HashMap::new(),
    );
    let errors = diagram.validate();
    assert!(errors.iter().any(|e| matches!(e, CompiledError::NoStartNode)));
  }

  #[test]
  fn validate_detects_incomplete_order() {
    let diagram = ExecutableDiagram::new(
      vec![start("s1"), endpoint("e1")],
      vec![edge("a1", "s1", "e1")],
      vec![NodeId::from("s1")],
      vec![vec![NodeId::from("s1")], vec![NodeId::from("e1")]],
      Map::new(),
      HashMap::new(),
    );
    let errors = diagram.validate();
    assert!(errors
      .iter()
      .any(|e| matches!(e, CompiledError::IncompleteOrder(missing) if missing == &vec![NodeId::from("e1")])));
  }

  #[test]
  fn hints_collect_start_nodes_and_dependencies() {
    let diagram = ExecutableDiagram::new(
      vec![start("s1"), endpoint("e1")],
      vec![edge("a1", "s1", "e1")],
      vec![NodeId::from("s1"), NodeId::from("e1")],
      vec![vec![NodeId::from("s1")], vec![NodeId::from("e1")]],
      Map::new(),
      HashMap::new(),
    );
    assert_eq!(diagram.hints().start_nodes, vec![NodeId::from("s1")]);
    let deps = diagram.hints().node_dependencies.get(&NodeId::from("e1")).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].source, NodeId::from("s1"));
  }
}
