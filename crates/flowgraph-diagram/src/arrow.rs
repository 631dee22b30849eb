use serde::{Deserialize, Serialize};

use crate::ids::ArrowId;
use crate::transform::TransformRule;

/// A connection between two handles, referenced by their canonical string
/// form (§3, §4.1). Resolution into concrete `NodeId`/`Direction` pairs is
/// the handle resolver's job (`flowgraph-compiler`), not this crate's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
  pub id: ArrowId,
  pub source: String,
  pub target: String,
  #[serde(default)]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "TransformRule::is_empty")]
  pub transform: TransformRule,
}
