use std::collections::HashSet;

use flowgraph_compiled::{CompiledNode, ExecutableDiagram};
use flowgraph_diagram::{ConditionKind, DomainDiagram, NodeData, NodeId, NodeType};

use crate::error::{CompileError, Severity, ValidationIssue};
use crate::handle::resolve_arrows;
use crate::order::{calculate_order, OrderInput};
use crate::transform::transform_connection;

/// Orchestrates C1 (handle resolution) -> C2 (arrow transformation) ->
/// C3 (order calculation) and enforces the always-on structural checks
/// (§4.4). Any `error`-severity issue aborts compilation.
pub fn compile(diagram: &DomainDiagram) -> Result<(ExecutableDiagram, Vec<ValidationIssue>), CompileError> {
  let mut issues = Vec::new();

  issues.extend(validate_shape(diagram));

  let effective_handles = diagram.effective_handles();
  let (connections, handle_errors) = resolve_arrows(&diagram.arrows, &diagram.nodes, &effective_handles);
  issues.extend(handle_errors.into_iter().map(ValidationIssue::error));

  let nodes_by_id = diagram.nodes_by_id();
  let arrows_by_id: std::collections::HashMap<_, _> =
    diagram.arrows.iter().map(|a| (a.id.to_string(), a)).collect();

  let mut edges = Vec::with_capacity(connections.len());
  for connection in &connections {
    let Some(arrow) = arrows_by_id.get(&connection.arrow_id) else {
      issues.push(ValidationIssue::error(format!(
        "connection for arrow {} has no matching arrow",
        connection.arrow_id
      )));
      continue;
    };
    let Some(source_node) = nodes_by_id.get(&connection.source_node_id) else {
      continue;
    };
    edges.push(transform_connection(connection, arrow, source_node));
  }

  let order_inputs: Vec<OrderInput> = diagram
    .nodes
    .iter()
    .map(|n| OrderInput {
      id: &n.id,
      node_type: n.node_type(),
      max_iteration: n.data.max_iteration(),
    })
    .collect();
  let (execution_order, levels, order_errors) = calculate_order(&order_inputs, &connections);
  issues.extend(order_errors.into_iter().map(ValidationIssue::error));

  if issues.iter().any(|i| i.severity == Severity::Error) {
    return Err(CompileError::Aborted(issues));
  }

  let compiled_nodes: Vec<CompiledNode> = diagram.nodes.iter().map(CompiledNode::from_domain).collect();
  let levels: Vec<Vec<NodeId>> = levels.into_iter().map(|l| l.nodes).collect();

  let metadata = diagram.metadata.clone();
  let api_keys = diagram
    .api_keys
    .iter()
    .filter_map(|k| k.service.clone().map(|s| (k.id.clone(), s)))
    .collect();

  let executable = ExecutableDiagram::new(compiled_nodes, edges, execution_order, levels, metadata, api_keys);

  Ok((executable, issues))
}

/// Node-type-specific shape checks and diagram-level invariants that must
/// hold regardless of connectivity (§4.4).
fn validate_shape(diagram: &DomainDiagram) -> Vec<ValidationIssue> {
  let mut issues = Vec::new();

  if !diagram.nodes.iter().any(|n| n.node_type() == NodeType::Start) {
    issues.push(ValidationIssue::error("diagram must have at least one start node"));
  }

  let mut seen_ids = HashSet::new();
  for node in &diagram.nodes {
    if !seen_ids.insert(node.id.clone()) {
      issues.push(ValidationIssue::error(format!("duplicate node id: {}", node.id)));
    }

    match &node.data {
      NodeData::PersonJob { person_id, llm_config, .. } | NodeData::PersonBatchJob { person_id, llm_config, .. } => {
        if person_id.is_none() && llm_config.is_none() {
          issues.push(ValidationIssue::error(format!(
            "node {} needs either person_id or an inline llm config",
            node.id
          )));
        }
      }
      NodeData::Condition { kind } => {
        if let ConditionKind::Expression { expression } = kind {
          if expression.trim().is_empty() {
            issues.push(ValidationIssue::error(format!(
              "condition node {} has an empty expression",
              node.id
            )));
          }
        }
      }
      _ => {}
    }
  }

  issues
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_diagram::{Arrow, ArrowId, DomainNode, Position, TransformRule};

  fn start(id: &str) -> DomainNode {
    DomainNode {
      id: NodeId::from(id),
      label: String::new(),
      position: Position { x: 0.0, y: 0.0 },
      data: NodeData::Start { trigger_payload: None },
      extensions: Default::default(),
    }
  }

  fn endpoint(id: &str) -> DomainNode {
    DomainNode {
      id: NodeId::from(id),
      label: String::new(),
      position: Position { x: 0.0, y: 0.0 },
      data: NodeData::Endpoint {
        save_to_file: false,
        file_name: None,
      },
      extensions: Default::default(),
    }
  }

  fn arrow(id: &str, source: &str, target: &str) -> Arrow {
    Arrow {
      id: ArrowId::from(id),
      source: source.to_string(),
      target: target.to_string(),
      label: None,
      transform: TransformRule::default(),
    }
  }

  #[test]
  fn compiles_a_minimal_linear_diagram() {
    let diagram = DomainDiagram {
      nodes: vec![start("s"), endpoint("e")],
      arrows: vec![arrow("a1", "s:default:output", "e:default:input")],
      ..Default::default()
    };
    let (executable, issues) = compile(&diagram).unwrap();
    assert!(issues.is_empty());
    assert_eq!(executable.nodes().len(), 2);
    assert_eq!(executable.edges().len(), 1);
    assert_eq!(executable.execution_order().len(), 2);
  }

  #[test]
  fn rejects_diagram_with_no_start_node() {
    let diagram = DomainDiagram {
      nodes: vec![endpoint("e")],
      arrows: vec![],
      ..Default::default()
    };
    let result = compile(&diagram);
    assert!(result.is_err());
  }

  #[test]
  fn rejects_duplicate_node_ids() {
    let diagram = DomainDiagram {
      nodes: vec![start("dup"), start("dup")],
      arrows: vec![],
      ..Default::default()
    };
    let result = compile(&diagram);
    match result {
      Err(CompileError::Aborted(issues)) => {
        assert!(issues.iter().any(|i| i.message.contains("duplicate node id")));
      }
      _ => panic!("expected aborted compilation"),
    }
  }
}
