use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use flowgraph_compiled::{CompiledNode, ExecutableDiagram};
use flowgraph_diagram::{ExecutionId, NodeId, NodeType};

use crate::error::StateError;
use crate::node_state::{NodeState, NodeStatus};
use crate::output::NodeOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Started,
  Running,
  Paused,
  Completed,
  Failed,
  Aborted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
  pub input: u64,
  pub output: u64,
  pub cached: u64,
}

impl TokenUsage {
  pub fn add(&mut self, other: TokenUsage) {
    self.input += other.input;
    self.output += other.output;
    self.cached += other.cached;
  }

  /// Reads `input_tokens`/`output_tokens`/`cached_tokens` out of a node's
  /// `NodeOutput::metadata` (§12: "handlers report it via `NodeOutput::metadata`,
  /// the state store aggregates it"). Missing or non-numeric keys count as 0 —
  /// most node types never set these, so this is a no-op for them.
  fn from_metadata(metadata: &Map<String, Value>) -> Self {
    let field = |key: &str| metadata.get(key).and_then(Value::as_u64).unwrap_or(0);
    TokenUsage {
      input: field("input_tokens"),
      output: field("output_tokens"),
      cached: field("cached_tokens"),
    }
  }
}

/// A snapshot of `ready_nodes()` plus the state revision it was computed
/// against, so it can be invalidated cheaply (§4.6: "readiness is cached
/// and invalidated on any node-state or output change").
struct ReadyCache {
  revision: u64,
  nodes: Vec<NodeId>,
}

/// Live, mutable execution state for one run of an `ExecutableDiagram`
/// (§3). Every mutation goes through `mark_running`/`mark_complete`/
/// `mark_failed`/`skip_node`, which keep the invariants in §3 ("Invariants
/// (must hold after every transition)") and bump the readiness revision.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionState {
  pub id: ExecutionId,
  pub diagram_id: String,
  pub status: ExecutionStatus,
  pub started_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ended_at: Option<DateTime<Utc>>,
  pub node_states: HashMap<NodeId, NodeState>,
  pub node_outputs: HashMap<NodeId, NodeOutput>,
  pub variables: Map<String, Value>,
  pub token_usage: TokenUsage,
  pub iteration_count: u64,
  pub max_global_iterations: u64,

  #[serde(skip)]
  revision: u64,
  #[serde(skip)]
  ready_cache: Option<ReadyCache>,
}

impl ExecutionState {
  pub fn new(id: ExecutionId, diagram: &ExecutableDiagram, diagram_id: String, max_global_iterations: u64) -> Self {
    let node_states = diagram
      .nodes()
      .iter()
      .map(|n| (n.id.clone(), NodeState::pending(n.id.clone(), n.max_iteration)))
      .collect();

    Self {
      id,
      diagram_id,
      status: ExecutionStatus::Started,
      started_at: now(),
      ended_at: None,
      node_states,
      node_outputs: HashMap::new(),
      variables: Map::new(),
      token_usage: TokenUsage::default(),
      iteration_count: 0,
      max_global_iterations,
      revision: 0,
      ready_cache: None,
    }
  }

  fn invalidate(&mut self) {
    self.revision += 1;
  }

  pub fn node_state(&self, id: &NodeId) -> Option<&NodeState> {
    self.node_states.get(id)
  }

  pub fn node_output(&self, id: &NodeId) -> Option<&NodeOutput> {
    self.node_outputs.get(id)
  }

  pub fn mark_running(&mut self, id: &NodeId) -> Result<(), StateError> {
    let state = self
      .node_states
      .get_mut(id)
      .ok_or_else(|| StateError::NodeNotFound(id.clone()))?;
    state.status = NodeStatus::Running;
    state.exec_count += 1;
    state.started_at = Some(now());
    self.invalidate();
    Ok(())
  }

  pub fn mark_complete(&mut self, id: &NodeId, diagram: &ExecutableDiagram, output: NodeOutput) -> Result<(), StateError> {
    {
      let state = self
        .node_states
        .get_mut(id)
        .ok_or_else(|| StateError::NodeNotFound(id.clone()))?;
      state.status = NodeStatus::Completed;
      state.ended_at = Some(now());
    }
    self.token_usage.add(TokenUsage::from_metadata(output.metadata()));
    self.node_outputs.insert(id.clone(), output);
    self.repend_or_exhaust_loop_targets(diagram, id);
    self.invalidate();
    Ok(())
  }

  /// When `source` just completed, an active outgoing edge may target a
  /// node that already ran in a previous iteration. Without this, a
  /// `Completed` node can never leave that status and a back-edge loop
  /// runs exactly once.
  ///
  /// Only `person_job`/`person_batch_job` carry the §3 invariant
  /// `exec_count <= max_iteration`, so only those types are capped here:
  /// budget remaining re-pends, exhausted budget transitions straight to
  /// `max_iter_reached` (§8 scenario 3: "executes exactly N times before
  /// transitioning to max_iter_reached"). Every other node type on a loop
  /// (a `condition` gating the back-edge, a `code_job` inside the loop
  /// body) has no such cap and simply re-pends each time it's retriggered.
  fn repend_or_exhaust_loop_targets(&mut self, diagram: &ExecutableDiagram, source: &NodeId) {
    let targets: Vec<NodeId> = diagram
      .outgoing(source)
      .iter()
      .filter(|edge| self.edge_active(edge))
      .map(|edge| edge.target_node_id.clone())
      .collect();

    for target in targets {
      let Some(state) = self.node_states.get(&target) else { continue };
      if state.status != NodeStatus::Completed {
        continue;
      }

      let capped = matches!(
        diagram.get_node(&target).map(|n| n.node_type),
        Some(NodeType::PersonJob) | Some(NodeType::PersonBatchJob)
      );

      if !capped || state.exec_count < state.max_iteration {
        if let Some(state) = self.node_states.get_mut(&target) {
          state.status = NodeStatus::Pending;
          state.ended_at = None;
        }
        self.invalidate();
      } else {
        self.transition_to_max_iter_reached(&target);
      }
    }
  }

  pub fn mark_failed(&mut self, id: &NodeId, error: impl Into<String>) -> Result<(), StateError> {
    let state = self
      .node_states
      .get_mut(id)
      .ok_or_else(|| StateError::NodeNotFound(id.clone()))?;
    state.status = NodeStatus::Failed;
    state.ended_at = Some(now());
    state.error = Some(error.into());
    self.invalidate();
    Ok(())
  }

  /// Mark a pending node `skipped`. Readiness treats a skipped node as
  /// completed-with-empty-output for downstream calculation (§4.7,
  /// §12 — skip_node reuses the terminal-but-not-failed status path).
  pub fn skip_node(&mut self, id: &NodeId) -> Result<(), StateError> {
    let state = self
      .node_states
      .get_mut(id)
      .ok_or_else(|| StateError::NodeNotFound(id.clone()))?;
    state.status = NodeStatus::Skipped;
    state.ended_at = Some(now());
    self.invalidate();
    Ok(())
  }

  fn transition_to_max_iter_reached(&mut self, id: &NodeId) {
    if let Some(state) = self.node_states.get_mut(id) {
      state.status = NodeStatus::MaxIterReached;
      state.ended_at = Some(now());
    }
    self.invalidate();
  }

  /// Whether `edge`'s source is a completed condition and the branch
  /// marker on the edge matches the condition's outcome (§4.6).
  fn edge_active(&self, edge: &flowgraph_compiled::Edge) -> bool {
    match self.node_outputs.get(&edge.source_node_id) {
      Some(output) => match output.condition_value() {
        Some(outcome) => edge.active_for_branch(outcome),
        None => true,
      },
      None => false,
    }
  }

  /// Effective incoming edges for `node` per its type's readiness strategy
  /// (§4.6): person_job gates on exec_count, everyone else sees every
  /// incoming edge.
  fn effective_incoming<'a>(
    &self,
    diagram: &'a ExecutableDiagram,
    node: &CompiledNode,
  ) -> Vec<&'a flowgraph_compiled::Edge> {
    let incoming: Vec<&flowgraph_compiled::Edge> = diagram.incoming(&node.id).iter().collect();
    if !matches!(node.node_type, NodeType::PersonJob | NodeType::PersonBatchJob) {
      return incoming;
    }

    let exec_count = self.node_states.get(&node.id).map(|s| s.exec_count).unwrap_or(0);
    if exec_count == 0 {
      let first: Vec<_> = incoming.iter().copied().filter(|e| e.targets_first_slot()).collect();
      if !first.is_empty() {
        return first;
      }
      incoming
    } else {
      incoming.into_iter().filter(|e| !e.targets_first_slot()).collect()
    }
  }

  fn is_ready(&mut self, diagram: &ExecutableDiagram, node: &CompiledNode) -> bool {
    let state = match self.node_states.get(&node.id) {
      Some(s) if s.status == NodeStatus::Pending => s,
      _ => return false,
    };

    if node.node_type == NodeType::Start {
      return true;
    }

    if matches!(node.node_type, NodeType::PersonJob | NodeType::PersonBatchJob) {
      if state.exec_count >= state.max_iteration {
        self.transition_to_max_iter_reached(&node.id);
        return false;
      }
    }

    let incoming = diagram.incoming(&node.id);
    if incoming.is_empty() {
      return true;
    }

    let effective = self.effective_incoming(diagram, node);
    effective.iter().all(|edge| {
      let predecessor_done = self
        .node_states
        .get(&edge.source_node_id)
        .map(|s| s.status == NodeStatus::Completed || s.status == NodeStatus::Skipped)
        .unwrap_or(false);
      predecessor_done && self.edge_active(edge)
    })
  }

  /// Pending nodes currently eligible to run (§4.6), cached until the next
  /// mutation.
  pub fn ready_nodes(&mut self, diagram: &ExecutableDiagram) -> Vec<NodeId> {
    if let Some(cache) = &self.ready_cache {
      if cache.revision == self.revision {
        return cache.nodes.clone();
      }
    }

    let candidates: Vec<CompiledNode> = diagram.nodes().to_vec();
    let ready: Vec<NodeId> = candidates
      .into_iter()
      .filter(|n| self.is_ready(diagram, n))
      .map(|n| n.id)
      .collect();

    self.ready_cache = Some(ReadyCache {
      revision: self.revision,
      nodes: ready.clone(),
    });
    ready
  }

  /// Nodes reachable from a start node through edges that are either
  /// unconditionally active or whose condition branch has already fired,
  /// used by `is_complete` to avoid declaring victory while a live branch
  /// still has pending/running work (§4.6).
  fn reachable_incomplete(&self, diagram: &ExecutableDiagram) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue: Vec<NodeId> = diagram.start_nodes().map(|n| n.id.clone()).collect();
    let mut incomplete = HashSet::new();

    while let Some(id) = queue.pop() {
      if !visited.insert(id.clone()) {
        continue;
      }
      if let Some(state) = self.node_states.get(&id) {
        if matches!(state.status, NodeStatus::Pending | NodeStatus::Running) {
          incomplete.insert(id.clone());
        }
      }
      for edge in diagram.outgoing(&id) {
        let proceed = match self.node_outputs.get(&id).and_then(|o| o.condition_value()) {
          Some(outcome) => edge.active_for_branch(outcome),
          None => true,
        };
        if proceed {
          queue.push(edge.target_node_id.clone());
        }
      }
    }

    incomplete
  }

  /// True once every node reachable from a start node (honoring condition
  /// branch activity) is out of `pending`/`running` (§4.6). Endpoint nodes
  /// all `completed` is the common case this reduces to.
  pub fn is_complete(&self, diagram: &ExecutableDiagram) -> bool {
    let all_endpoints_done = diagram
      .end_nodes()
      .all(|n| matches!(self.node_states.get(&n.id).map(|s| s.status), Some(NodeStatus::Completed)));
    if all_endpoints_done {
      return true;
    }
    self.reachable_incomplete(diagram).is_empty()
  }

  pub fn has_failed_node(&self) -> bool {
    self.node_states.values().any(|s| s.status == NodeStatus::Failed)
  }

  /// Fraction of nodes no longer pending/running, for progress reporting.
  pub fn progress(&self) -> f64 {
    if self.node_states.is_empty() {
      return 1.0;
    }
    let done = self
      .node_states
      .values()
      .filter(|s| !matches!(s.status, NodeStatus::Pending | NodeStatus::Running))
      .count();
    done as f64 / self.node_states.len() as f64
  }
}

fn now() -> DateTime<Utc> {
  Utc::now()
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_compiled::{Edge, EdgeMetadata};
  use flowgraph_diagram::{ArrowId, NodeData};
  use std::collections::HashMap as StdHashMap;

  fn node(id: &str, node_type: NodeType, max_iteration: u32) -> CompiledNode {
    let data = match node_type {
      NodeType::Start => NodeData::Start { trigger_payload: None },
      NodeType::Endpoint => NodeData::Endpoint {
        save_to_file: false,
        file_name: None,
      },
      NodeType::Condition => NodeData::Condition {
        kind: flowgraph_diagram::ConditionKind::Expression {
          expression: "true".into(),
        },
      },
      _ => NodeData::CodeJob {
        language: flowgraph_diagram::CodeLanguage::Python,
        code: "pass".into(),
        timeout_ms: None,
      },
    };
    CompiledNode {
      id: NodeId::from(id),
      node_type,
      data,
      max_iteration,
    }
  }

  fn edge(id: &str, from: &str, to: &str) -> Edge {
    Edge {
      id: ArrowId::from(id),
      source_node_id: NodeId::from(from),
      target_node_id: NodeId::from(to),
      source_output: None,
      target_input: None,
      transform: Default::default(),
      metadata: EdgeMetadata::default(),
    }
  }

  fn diagram(nodes: Vec<CompiledNode>, edges: Vec<Edge>) -> ExecutableDiagram {
    let order: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let levels = vec![order.clone()];
    ExecutableDiagram::new(nodes, edges, order, levels, Map::new(), StdHashMap::new())
  }

  #[test]
  fn start_node_is_always_ready() {
    let diagram = diagram(vec![node("s", NodeType::Start, 1)], vec![]);
    let mut state = ExecutionState::new(ExecutionId::from("e1"), &diagram, "d1".into(), 100);
    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("s")]);
  }

  #[test]
  fn downstream_node_waits_for_predecessor() {
    let diagram = diagram(
      vec![node("s", NodeType::Start, 1), node("e", NodeType::Endpoint, 1)],
      vec![edge("a1", "s", "e")],
    );
    let mut state = ExecutionState::new(ExecutionId::from("e1"), &diagram, "d1".into(), 100);
    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("s")]);

    state.mark_running(&NodeId::from("s")).unwrap();
    state.mark_complete(&NodeId::from("s"), &diagram, NodeOutput::value(Value::Null)).unwrap();
    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("e")]);
  }

  #[test]
  fn person_job_reruns_on_an_active_back_edge_until_max_iteration_then_stops() {
    // s -> p -> c -> p (branch true, loops) / c -> e (branch false, exits)
    let diagram = diagram(
      vec![
        node("s", NodeType::Start, 1),
        node("p", NodeType::PersonJob, 2),
        node("c", NodeType::Condition, 1),
        node("e", NodeType::Endpoint, 1),
      ],
      vec![
        Edge {
          target_input: Some("first".to_string()),
          ..edge("s-p", "s", "p")
        },
        edge("p-c", "p", "c"),
        Edge {
          metadata: EdgeMetadata {
            label: None,
            branch: Some(true),
          },
          ..edge("c-p", "c", "p")
        },
        Edge {
          metadata: EdgeMetadata {
            label: None,
            branch: Some(false),
          },
          ..edge("c-e", "c", "e")
        },
      ],
    );
    let mut state = ExecutionState::new(ExecutionId::from("e1"), &diagram, "d1".into(), 100);

    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("s")]);
    state.mark_running(&NodeId::from("s")).unwrap();
    state.mark_complete(&NodeId::from("s"), &diagram, NodeOutput::value(Value::Null)).unwrap();

    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("p")]);
    state.mark_running(&NodeId::from("p")).unwrap();
    state.mark_complete(&NodeId::from("p"), &diagram, NodeOutput::value(Value::Null)).unwrap();

    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("c")]);
    state.mark_running(&NodeId::from("c")).unwrap();
    state
      .mark_complete(&NodeId::from("c"), &diagram, NodeOutput::condition(true, Value::Null, Value::Null))
      .unwrap();

    // the true branch fires back into p, which still has budget left (exec_count 1 < max_iteration 2)
    assert_eq!(state.node_state(&NodeId::from("p")).unwrap().status, NodeStatus::Pending);
    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("p")]);

    state.mark_running(&NodeId::from("p")).unwrap();
    state.mark_complete(&NodeId::from("p"), &diagram, NodeOutput::value(Value::Null)).unwrap();
    assert_eq!(state.ready_nodes(&diagram), vec![NodeId::from("c")]);
    state.mark_running(&NodeId::from("c")).unwrap();
    state
      .mark_complete(&NodeId::from("c"), &diagram, NodeOutput::condition(true, Value::Null, Value::Null))
      .unwrap();

    // exec_count is now 2, budget exhausted: p transitions to max_iter_reached instead of re-pending
    assert_eq!(state.node_state(&NodeId::from("p")).unwrap().status, NodeStatus::MaxIterReached);
    assert_eq!(state.ready_nodes(&diagram), Vec::<NodeId>::new());
  }

  #[test]
  fn token_usage_aggregates_metadata_across_completions() {
    let diagram = diagram(
      vec![node("s", NodeType::Start, 1), node("e", NodeType::Endpoint, 1)],
      vec![edge("a1", "s", "e")],
    );
    let mut state = ExecutionState::new(ExecutionId::from("e1"), &diagram, "d1".into(), 100);

    let mut metadata = Map::new();
    metadata.insert("input_tokens".to_string(), Value::from(10));
    metadata.insert("output_tokens".to_string(), Value::from(4));
    state.mark_running(&NodeId::from("s")).unwrap();
    state
      .mark_complete(
        &NodeId::from("s"),
        &diagram,
        NodeOutput::Standard {
          value: Value::Null,
          outputs: Map::new(),
          metadata,
        },
      )
      .unwrap();

    let mut metadata = Map::new();
    metadata.insert("input_tokens".to_string(), Value::from(2));
    metadata.insert("cached_tokens".to_string(), Value::from(6));
    state.mark_running(&NodeId::from("e")).unwrap();
    state
      .mark_complete(
        &NodeId::from("e"),
        &diagram,
        NodeOutput::Standard {
          value: Value::Null,
          outputs: Map::new(),
          metadata,
        },
      )
      .unwrap();

    assert_eq!(
      state.token_usage,
      TokenUsage {
        input: 12,
        output: 4,
        cached: 6,
      }
    );
  }

  #[test]
  fn inactive_condition_branch_blocks_downstream() {
    let diagram = diagram(
      vec![
        node("s", NodeType::Start, 1),
        node("c", NodeType::Condition, 1),
        node("t", NodeType::Endpoint, 1),
        node("f", NodeType::Endpoint, 1),
      ],
      vec![
        edge("s-c", "s", "c"),
        Edge {
          metadata: EdgeMetadata {
            label: None,
            branch: Some(true),
          },
          ..edge("c-t", "c", "t")
        },
        Edge {
          metadata: EdgeMetadata {
            label: None,
            branch: Some(false),
          },
          ..edge("c-f", "c", "f")
        },
      ],
    );
    let mut state = ExecutionState::new(ExecutionId::from("e1"), &diagram, "d1".into(), 100);
    state.mark_running(&NodeId::from("s")).unwrap();
    state.mark_complete(&NodeId::from("s"), &diagram, NodeOutput::value(Value::Null)).unwrap();
    state.mark_running(&NodeId::from("c")).unwrap();
    state
      .mark_complete(&NodeId::from("c"), &diagram, NodeOutput::condition(true, Value::Null, Value::Null))
      .unwrap();

    let ready = state.ready_nodes(&diagram);
    assert_eq!(ready, vec![NodeId::from("t")]);
  }
}
