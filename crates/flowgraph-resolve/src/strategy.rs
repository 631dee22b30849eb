use flowgraph_compiled::Edge;
use flowgraph_diagram::NodeType;

/// Node-type-specific edge filtering for input resolution (§4.5 step 1).
/// `person_job`/`person_batch_job` gate on execution count; every other
/// node type accepts every incoming edge unconditionally.
pub fn effective_edges<'a>(node_type: NodeType, exec_count: u32, incoming: &'a [Edge]) -> Vec<&'a Edge> {
  if !matches!(node_type, NodeType::PersonJob | NodeType::PersonBatchJob) {
    return incoming.iter().collect();
  }

  let has_first = incoming.iter().any(|e| e.targets_first_slot());
  let always_on = |e: &&Edge| e.transform.content_type == Some(flowgraph_diagram::ContentType::ConversationState);

  if exec_count == 1 {
    if has_first {
      incoming.iter().filter(|e| always_on(e) || e.targets_first_slot()).collect()
    } else {
      incoming
        .iter()
        .filter(|e| always_on(e) || e.target_input.is_none() || e.target_input.as_deref() == Some("default"))
        .collect()
    }
  } else {
    incoming.iter().filter(|e| always_on(e) || !e.targets_first_slot()).collect()
  }
}
