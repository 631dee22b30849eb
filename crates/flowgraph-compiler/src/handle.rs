use std::collections::HashSet;

use flowgraph_diagram::{parse_handle_ref, Arrow, Direction, DomainNode, Handle, NodeId};

/// An arrow whose handle references have been parsed and checked against
/// the node set (§4.1). Produced for every arrow that resolves cleanly;
/// arrows that fail are reported as a `ValidationIssue` by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
  pub arrow_id: String,
  pub source_node_id: NodeId,
  pub target_node_id: NodeId,
  pub source_handle: Option<String>,
  pub target_handle: Option<String>,
}

/// Resolve every arrow's string handle references into concrete node ids
/// and handle names, dropping (and reporting) any arrow that cannot be
/// resolved rather than failing the whole pass (§4.1: "on any failure the
/// connection is omitted and an error is recorded"). `handles` is the
/// diagram's effective handle set (declared plus §6 synthesized defaults);
/// an arrow naming a handle absent from it is rejected the same way as an
/// arrow naming a missing node.
pub fn resolve_arrows(arrows: &[Arrow], nodes: &[DomainNode], handles: &[Handle]) -> (Vec<ResolvedConnection>, Vec<String>) {
  let node_ids: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
  let handle_keys: HashSet<(&NodeId, &str, Direction)> =
    handles.iter().map(|h| (&h.node_id, h.name.as_str(), h.direction)).collect();
  let mut resolved = Vec::with_capacity(arrows.len());
  let mut errors = Vec::new();

  for arrow in arrows {
    match resolve_one(arrow, &node_ids, &handle_keys) {
      Ok(connection) => resolved.push(connection),
      Err(message) => errors.push(message),
    }
  }

  (resolved, errors)
}

fn resolve_one(
  arrow: &Arrow,
  node_ids: &HashSet<&NodeId>,
  handle_keys: &HashSet<(&NodeId, &str, Direction)>,
) -> Result<ResolvedConnection, String> {
  let source = parse_handle_ref(&arrow.source)
    .ok_or_else(|| format!("arrow {}: invalid source handle format: {}", arrow.id, arrow.source))?;
  let target = parse_handle_ref(&arrow.target)
    .ok_or_else(|| format!("arrow {}: invalid target handle format: {}", arrow.id, arrow.target))?;

  if !node_ids.contains(&source.node_id) {
    return Err(format!("arrow {}: source node '{}' not found", arrow.id, source.node_id));
  }
  if !node_ids.contains(&target.node_id) {
    return Err(format!("arrow {}: target node '{}' not found", arrow.id, target.node_id));
  }
  if source.direction != Direction::Output {
    return Err(format!("arrow {}: source must be an output handle", arrow.id));
  }
  if target.direction != Direction::Input {
    return Err(format!("arrow {}: target must be an input handle", arrow.id));
  }
  if !handle_keys.contains(&(&source.node_id, source.handle_name.as_str(), Direction::Output)) {
    return Err(format!(
      "arrow {}: node '{}' has no output handle named '{}'",
      arrow.id, source.node_id, source.handle_name
    ));
  }
  if !handle_keys.contains(&(&target.node_id, target.handle_name.as_str(), Direction::Input)) {
    return Err(format!(
      "arrow {}: node '{}' has no input handle named '{}'",
      arrow.id, target.node_id, target.handle_name
    ));
  }

  Ok(ResolvedConnection {
    arrow_id: arrow.id.to_string(),
    source_node_id: source.node_id,
    target_node_id: target.node_id,
    source_handle: Some(source.handle_name),
    target_handle: Some(target.handle_name),
  })
}
