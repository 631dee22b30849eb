use flowgraph_compiled::{Edge, EdgeMetadata};
use flowgraph_diagram::{Arrow, ContentType, DomainNode, NodeType, TransformRule};

use crate::handle::ResolvedConnection;

/// Default `content_type` by source node type (§4.2): `person_job` edges
/// carry conversation state, `db` edges carry structured variables,
/// `code_job` edges carry raw text, everything else defaults to raw text.
fn default_transform_for(source_type: NodeType) -> TransformRule {
  let content_type = match source_type {
    NodeType::PersonJob | NodeType::PersonBatchJob => ContentType::ConversationState,
    NodeType::Db => ContentType::Variable,
    NodeType::CodeJob => ContentType::RawText,
    _ => ContentType::RawText,
  };
  TransformRule {
    content_type: Some(content_type),
    ..Default::default()
  }
}

/// Build the compiled edge for one resolved connection, merging the
/// node-type default transform, the arrow's declared transform, and any
/// connection-level override implied by the resolved handles (§4.2).
pub fn transform_connection(connection: &ResolvedConnection, arrow: &Arrow, source_node: &DomainNode) -> Edge {
  let defaults = default_transform_for(source_node.node_type());
  let mut transform = defaults.merge(&arrow.transform);

  // A connection leaving a condition's true/false output is implicitly a
  // branch edge even when the author never declared `branch_on` (§4.2,
  // §4.6): the handle name itself is the override.
  let branch = match connection.source_handle.as_deref() {
    Some("condtrue") => Some(true),
    Some("condfalse") => Some(false),
    _ => None,
  };
  if transform.branch_on.is_none() && branch.is_some() {
    transform.branch_on = Some("condition_result".to_string());
  }

  Edge {
    id: flowgraph_diagram::ArrowId::from(connection.arrow_id.clone()),
    source_node_id: connection.source_node_id.clone(),
    target_node_id: connection.target_node_id.clone(),
    source_output: connection.source_handle.clone(),
    target_input: connection.target_handle.clone(),
    transform,
    metadata: EdgeMetadata {
      label: arrow.label.clone(),
      branch,
    },
  }
}
