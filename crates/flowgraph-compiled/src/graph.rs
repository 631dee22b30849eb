use std::collections::{HashMap, HashSet};

use flowgraph_diagram::NodeId;

use crate::edge::Edge;

/// Adjacency structure over compiled edges (generalized from a plain
/// `(from, to)` edge list to carry full `Edge` values, since downstream
/// consumers need the transform and branch metadata, not just shape).
#[derive(Debug, Clone)]
pub struct Graph {
  outgoing: HashMap<NodeId, Vec<Edge>>,
  incoming: HashMap<NodeId, Vec<Edge>>,
  entry_points: Vec<NodeId>,
  join_points: HashSet<NodeId>,
}

impl Graph {
  pub fn new(node_ids: &[NodeId], edges: &[Edge]) -> Self {
    let mut outgoing: HashMap<NodeId, Vec<Edge>> = HashMap::new();
    let mut incoming: HashMap<NodeId, Vec<Edge>> = HashMap::new();

    for id in node_ids {
      outgoing.entry(id.clone()).or_default();
      incoming.entry(id.clone()).or_default();
    }

    for edge in edges {
      outgoing
        .entry(edge.source_node_id.clone())
        .or_default()
        .push(edge.clone());
      incoming
        .entry(edge.target_node_id.clone())
        .or_default()
        .push(edge.clone());
    }

    let entry_points: Vec<NodeId> = node_ids
      .iter()
      .filter(|id| incoming.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    let join_points: HashSet<NodeId> = incoming
      .iter()
      .filter(|(_, edges)| edges.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      outgoing,
      incoming,
      entry_points,
      join_points,
    }
  }

  pub fn entry_points(&self) -> &[NodeId] {
    &self.entry_points
  }

  pub fn outgoing(&self, node_id: &NodeId) -> &[Edge] {
    self.outgoing.get(node_id).map(|v| v.as_slice()).unwrap_or(&[])
  }

  pub fn incoming(&self, node_id: &NodeId) -> &[Edge] {
    self.incoming.get(node_id).map(|v| v.as_slice()).unwrap_or(&[])
  }

  pub fn is_join_point(&self, node_id: &NodeId) -> bool {
    self.join_points.contains(node_id)
  }

  pub fn join_points(&self) -> &HashSet<NodeId> {
    &self.join_points
  }
}
