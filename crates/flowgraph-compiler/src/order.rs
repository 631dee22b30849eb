use std::collections::{HashMap, HashSet, VecDeque};

use flowgraph_diagram::{NodeId, NodeType};

use crate::handle::ResolvedConnection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLevel {
  pub level: usize,
  pub nodes: Vec<NodeId>,
}

/// Minimal per-node facts the order calculator needs, decoupled from
/// `DomainNode` so it can run before the rest of compilation settles.
pub struct OrderInput<'a> {
  pub id: &'a NodeId,
  pub node_type: NodeType,
  pub max_iteration: u32,
}

/// Topologically order the diagram, tolerating cycles induced by an
/// iterating `person_job` or a `condition` back-edge (§4.3). Returns an
/// error string per rejected strongly-connected component.
pub fn calculate_order(
  nodes: &[OrderInput],
  connections: &[ResolvedConnection],
) -> (Vec<NodeId>, Vec<ExecutionLevel>, Vec<String>) {
  let node_ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
  let mut adjacency: HashMap<NodeId, Vec<NodeId>> =
    node_ids.iter().map(|id| (id.clone(), Vec::new())).collect();
  for conn in connections {
    adjacency
      .entry(conn.source_node_id.clone())
      .or_default()
      .push(conn.target_node_id.clone());
  }

  let sccs = tarjan_scc(&node_ids, &adjacency);

  let mut errors = Vec::new();
  let node_facts: HashMap<&NodeId, (NodeType, u32)> =
    nodes.iter().map(|n| (n.id, (n.node_type, n.max_iteration))).collect();

  for scc in &sccs {
    if scc.len() <= 1 {
      continue;
    }
    let accepted = scc.iter().any(|id| match node_facts.get(id) {
      Some((NodeType::Condition, _)) => true,
      Some((NodeType::PersonJob | NodeType::PersonBatchJob, max_iter)) => *max_iter > 1,
      _ => false,
    });
    if !accepted {
      let mut members: Vec<String> = scc.iter().map(|id| id.to_string()).collect();
      members.sort();
      errors.push(format!(
        "cycle detected among nodes [{}] with no condition or iterating person_job to justify it",
        members.join(", ")
      ));
    }
  }

  // scc_of[node] = index into `sccs`.
  let mut scc_of: HashMap<NodeId, usize> = HashMap::new();
  for (i, scc) in sccs.iter().enumerate() {
    for id in scc {
      scc_of.insert(id.clone(), i);
    }
  }

  // Condensation graph: edges between distinct SCCs, deduplicated.
  let mut condensation: Vec<HashSet<usize>> = vec![HashSet::new(); sccs.len()];
  let mut in_degree = vec![0usize; sccs.len()];
  for (from, targets) in &adjacency {
    let from_scc = scc_of[from];
    for to in targets {
      let to_scc = scc_of[to];
      if from_scc != to_scc && condensation[from_scc].insert(to_scc) {
        in_degree[to_scc] += 1;
      }
    }
  }

  // Kahn's algorithm over the condensation DAG, tracking longest-path
  // depth so members can be grouped into levels (§4.3).
  let mut queue: VecDeque<usize> = (0..sccs.len()).filter(|&i| in_degree[i] == 0).collect();
  let mut scc_level = vec![0usize; sccs.len()];
  let mut scc_order = Vec::with_capacity(sccs.len());
  let mut remaining = in_degree.clone();

  while let Some(i) = queue.pop_front() {
    scc_order.push(i);
    for &next in &condensation[i] {
      scc_level[next] = scc_level[next].max(scc_level[i] + 1);
      remaining[next] -= 1;
      if remaining[next] == 0 {
        queue.push_back(next);
      }
    }
  }

  let mut order = Vec::with_capacity(node_ids.len());
  let mut levels_map: HashMap<usize, Vec<NodeId>> = HashMap::new();
  for &i in &scc_order {
    let mut members = sccs[i].clone();
    members.sort();
    for id in &members {
      order.push(id.clone());
    }
    levels_map.entry(scc_level[i]).or_default().extend(members);
  }

  let mut levels: Vec<ExecutionLevel> = levels_map
    .into_iter()
    .map(|(level, nodes)| ExecutionLevel { level, nodes })
    .collect();
  levels.sort_by_key(|l| l.level);

  (order, levels, errors)
}

/// Tarjan's strongly-connected-components algorithm, iterative (explicit
/// call-stack frames carrying a child cursor) to avoid recursion depth
/// limits on large diagrams.
fn tarjan_scc(node_ids: &[NodeId], adjacency: &HashMap<NodeId, Vec<NodeId>>) -> Vec<Vec<NodeId>> {
  struct CallFrame {
    node: NodeId,
    neighbors: Vec<NodeId>,
    next_child: usize,
  }

  let mut index: HashMap<NodeId, usize> = HashMap::new();
  let mut lowlink: HashMap<NodeId, usize> = HashMap::new();
  let mut on_stack: HashSet<NodeId> = HashSet::new();
  let mut stack: Vec<NodeId> = Vec::new();
  let mut counter = 0usize;
  let mut sccs: Vec<Vec<NodeId>> = Vec::new();

  for start in node_ids {
    if index.contains_key(start) {
      continue;
    }

    let mut call_stack: Vec<CallFrame> = vec![CallFrame {
      node: start.clone(),
      neighbors: adjacency.get(start).cloned().unwrap_or_default(),
      next_child: 0,
    }];
    index.insert(start.clone(), counter);
    lowlink.insert(start.clone(), counter);
    counter += 1;
    stack.push(start.clone());
    on_stack.insert(start.clone());

    while let Some(frame) = call_stack.last_mut() {
      if frame.next_child < frame.neighbors.len() {
        let neighbor = frame.neighbors[frame.next_child].clone();
        frame.next_child += 1;

        if !index.contains_key(&neighbor) {
          index.insert(neighbor.clone(), counter);
          lowlink.insert(neighbor.clone(), counter);
          counter += 1;
          stack.push(neighbor.clone());
          on_stack.insert(neighbor.clone());
          call_stack.push(CallFrame {
            neighbors: adjacency.get(&neighbor).cloned().unwrap_or_default(),
            node: neighbor,
            next_child: 0,
          });
        } else if on_stack.contains(&neighbor) {
          let node = frame.node.clone();
          let candidate = index[&neighbor];
          let cur = lowlink[&node];
          lowlink.insert(node, cur.min(candidate));
        }
      } else {
        let node = frame.node.clone();
        call_stack.pop();

        if let Some(parent) = call_stack.last() {
          let parent_node = parent.node.clone();
          let child_low = lowlink[&node];
          let cur = lowlink[&parent_node];
          lowlink.insert(parent_node, cur.min(child_low));
        }

        if lowlink[&node] == index[&node] {
          let mut component = Vec::new();
          loop {
            let w = stack.pop().expect("scc stack not empty");
            on_stack.remove(&w);
            let is_root = w == node;
            component.push(w);
            if is_root {
              break;
            }
          }
          sccs.push(component);
        }
      }
    }
  }

  sccs
}
