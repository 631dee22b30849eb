use serde::{Deserialize, Serialize};

use flowgraph_diagram::{ArrowId, NodeId, TransformRule};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  /// Set when the source is a `condition` node and this edge belongs to a
  /// specific branch outcome; readiness/input resolution treat an edge
  /// without this field as unconditionally active (§4.6).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub branch: Option<bool>,
}

/// Compiled, executable counterpart of an [`Arrow`](flowgraph_diagram::Arrow)
/// with resolved endpoints and a fully merged transform (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub id: ArrowId,
  pub source_node_id: NodeId,
  pub target_node_id: NodeId,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_output: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target_input: Option<String>,
  pub transform: TransformRule,
  #[serde(default)]
  pub metadata: EdgeMetadata,
}

impl Edge {
  /// The key inputs are stored under when this edge's value is assigned
  /// (§4.5 step 5): `metadata.label ?? target_input ?? "default"`.
  pub fn input_key(&self) -> &str {
    self
      .metadata
      .label
      .as_deref()
      .or(self.target_input.as_deref())
      .unwrap_or("default")
  }

  /// Whether `target_input` names (or falls back to) the "first execution
  /// only" slot used by `person_job` input gating (§4.5, §4.6).
  pub fn targets_first_slot(&self) -> bool {
    match self.target_input.as_deref() {
      Some("first") => true,
      Some(s) => s.ends_with("_first"),
      None => false,
    }
  }

  /// Whether this edge is active for a condition outcome of `outcome`,
  /// per §4.6: a branch marker must match, or absence of one means
  /// default-active.
  pub fn active_for_branch(&self, outcome: bool) -> bool {
    match self.metadata.branch {
      Some(branch) => branch == outcome,
      None => match self.source_output.as_deref() {
        Some("condtrue") => outcome,
        Some("condfalse") => !outcome,
        _ => true,
      },
    }
  }
}
