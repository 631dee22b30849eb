use serde_json::{Map, Value};

use flowgraph_compiled::{CompiledNode, ExecutableDiagram};
use flowgraph_state::ExecutionState;

use crate::strategy::effective_edges;
use crate::transform::apply_transform;

/// Resolve `target`'s inputs from its incoming edges and the current
/// execution state (§4.5). Processes effective edges in diagram order;
/// when two edges assign the same input key, the later one wins.
pub fn resolve_inputs(target: &CompiledNode, diagram: &ExecutableDiagram, state: &ExecutionState) -> Map<String, Value> {
  let mut inputs = Map::new();

  let incoming = diagram.incoming(&target.id);
  let exec_count = state.node_state(&target.id).map(|s| s.exec_count).unwrap_or(0);
  let effective = effective_edges(target.node_type, exec_count, incoming);

  for edge in effective {
    let Some(output) = state.node_output(&edge.source_node_id) else {
      continue;
    };

    let outputs_map = output.as_outputs_map();
    let port = edge.source_output.as_deref().unwrap_or("default");

    let selected = if let Some(value) = outputs_map.get(port) {
      value.clone()
    } else if port == "default" {
      output.value_ref().clone()
    } else if let Some(value) = outputs_map.get("default") {
      value.clone()
    } else {
      continue;
    };

    let transformed = apply_transform(&edge.transform, selected);
    inputs.insert(edge.input_key().to_string(), transformed);
  }

  inputs
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_compiled::{Edge, EdgeMetadata};
  use flowgraph_diagram::{ArrowId, ConditionKind, NodeData, NodeId, NodeType, TransformRule};
  use flowgraph_state::{ExecutionState, NodeOutput};
  use serde_json::json;
  use std::collections::HashMap;

  fn code_job(id: &str) -> CompiledNode {
    CompiledNode {
      id: NodeId::from(id),
      node_type: NodeType::CodeJob,
      data: NodeData::CodeJob {
        language: flowgraph_diagram::CodeLanguage::Python,
        code: "pass".into(),
        timeout_ms: None,
      },
      max_iteration: 1,
    }
  }

  fn condition(id: &str) -> CompiledNode {
    CompiledNode {
      id: NodeId::from(id),
      node_type: NodeType::Condition,
      data: NodeData::Condition {
        kind: ConditionKind::Expression {
          expression: "true".into(),
        },
      },
      max_iteration: 1,
    }
  }

  fn edge(id: &str, from: &str, to: &str, source_output: Option<&str>, target_input: Option<&str>) -> Edge {
    Edge {
      id: ArrowId::from(id),
      source_node_id: NodeId::from(from),
      target_node_id: NodeId::from(to),
      source_output: source_output.map(str::to_string),
      target_input: target_input.map(str::to_string),
      transform: TransformRule::default(),
      metadata: EdgeMetadata::default(),
    }
  }

  fn build_diagram(nodes: Vec<CompiledNode>, edges: Vec<Edge>) -> ExecutableDiagram {
    let order: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let levels = vec![order.clone()];
    ExecutableDiagram::new(nodes, edges, order, levels, Default::default(), HashMap::new())
  }

  #[test]
  fn selects_default_port_for_non_mapping_output() {
    let diagram = build_diagram(vec![code_job("a"), code_job("b")], vec![edge("e1", "a", "b", None, None)]);
    let mut state = ExecutionState::new(
      flowgraph_diagram::ExecutionId::from("ex1"),
      &diagram,
      "d1".into(),
      100,
    );
    state.mark_running(&NodeId::from("a")).unwrap();
    state.mark_complete(&NodeId::from("a"), &diagram, NodeOutput::value(json!("hi"))).unwrap();

    let inputs = resolve_inputs(diagram.get_node(&NodeId::from("b")).unwrap(), &diagram, &state);
    assert_eq!(inputs.get("default"), Some(&json!("hi")));
  }

  #[test]
  fn condition_output_synthesizes_branch_key() {
    let diagram = build_diagram(
      vec![condition("c"), code_job("t")],
      vec![edge("e1", "c", "t", Some("condtrue"), None)],
    );
    let mut state = ExecutionState::new(
      flowgraph_diagram::ExecutionId::from("ex1"),
      &diagram,
      "d1".into(),
      100,
    );
    state.mark_running(&NodeId::from("c")).unwrap();
    state
      .mark_complete(&NodeId::from("c"), &diagram, NodeOutput::condition(true, json!("yes"), json!("no")))
      .unwrap();

    let inputs = resolve_inputs(diagram.get_node(&NodeId::from("t")).unwrap(), &diagram, &state);
    assert_eq!(inputs.get("default"), Some(&json!("yes")));
  }

  #[test]
  fn later_edge_wins_on_duplicate_input_key() {
    let diagram = build_diagram(
      vec![code_job("a"), code_job("b"), code_job("c")],
      vec![
        edge("e1", "a", "c", None, Some("x")),
        edge("e2", "b", "c", None, Some("x")),
      ],
    );
    let mut state = ExecutionState::new(
      flowgraph_diagram::ExecutionId::from("ex1"),
      &diagram,
      "d1".into(),
      100,
    );
    state.mark_running(&NodeId::from("a")).unwrap();
    state.mark_complete(&NodeId::from("a"), &diagram, NodeOutput::value(json!("first"))).unwrap();
    state.mark_running(&NodeId::from("b")).unwrap();
    state.mark_complete(&NodeId::from("b"), &diagram, NodeOutput::value(json!("second"))).unwrap();

    let inputs = resolve_inputs(diagram.get_node(&NodeId::from("c")).unwrap(), &diagram, &state);
    assert_eq!(inputs.get("x"), Some(&json!("second")));
  }

  #[test]
  fn edge_without_output_is_skipped() {
    let diagram = build_diagram(vec![code_job("a"), code_job("b")], vec![edge("e1", "a", "b", None, None)]);
    let state = ExecutionState::new(
      flowgraph_diagram::ExecutionId::from("ex1"),
      &diagram,
      "d1".into(),
      100,
    );
    let inputs = resolve_inputs(diagram.get_node(&NodeId::from("b")).unwrap(), &diagram, &state);
    assert!(inputs.is_empty());
  }
}
