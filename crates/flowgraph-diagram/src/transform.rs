use serde::{Deserialize, Serialize};
use serde_json::Map;
use serde_json::Value;

/// Recognized `content_type` values for a transform rule.
///
/// Defaults are assigned by the arrow transformer based on the source
/// node's type (see `flowgraph-compiler`); unrecognized string values are
/// preserved in the node data but treated as `RawText` by the input
/// resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
  Object,
  ConversationState,
  RawText,
  Variable,
}

/// A transform attached to an edge (merged from node-type defaults, arrow
/// declarations, and explicit connection overrides — see §4.2).
///
/// Unknown keys are preserved in `extra` but never applied by the input
/// resolver (§4.5 step 4: "Unknown rules are preserved but not applied").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_type: Option<ContentType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extract_variable: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extract_tool_results: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub branch_on: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl TransformRule {
  pub fn is_empty(&self) -> bool {
    self.content_type.is_none()
      && self.extract_variable.is_none()
      && self.format.is_none()
      && self.extract_tool_results.is_none()
      && self.branch_on.is_none()
      && self.extra.is_empty()
  }

  /// Merge `other` on top of `self`: fields set in `other` win.
  /// This realizes the merge order in §4.2 ("later wins") when callers
  /// fold defaults -> arrow declarations -> connection overrides.
  pub fn merge(mut self, other: &TransformRule) -> TransformRule {
    if other.content_type.is_some() {
      self.content_type = other.content_type;
    }
    if other.extract_variable.is_some() {
      self.extract_variable = other.extract_variable.clone();
    }
    if other.format.is_some() {
      self.format = other.format.clone();
    }
    if other.extract_tool_results.is_some() {
      self.extract_tool_results = other.extract_tool_results;
    }
    if other.branch_on.is_some() {
      self.branch_on = other.branch_on.clone();
    }
    for (k, v) in &other.extra {
      self.extra.insert(k.clone(), v.clone());
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn later_wins_on_merge() {
    let defaults = TransformRule {
      content_type: Some(ContentType::RawText),
      ..Default::default()
    };
    let override_rule = TransformRule {
      content_type: Some(ContentType::ConversationState),
      ..Default::default()
    };
    let merged = defaults.merge(&override_rule);
    assert_eq!(merged.content_type, Some(ContentType::ConversationState));
  }

  #[test]
  fn merge_preserves_unset_fields() {
    let defaults = TransformRule {
      content_type: Some(ContentType::RawText),
      extract_variable: Some("name".into()),
      ..Default::default()
    };
    let override_rule = TransformRule {
      format: Some("{value}!".into()),
      ..Default::default()
    };
    let merged = defaults.merge(&override_rule);
    assert_eq!(merged.content_type, Some(ContentType::RawText));
    assert_eq!(merged.extract_variable.as_deref(), Some("name"));
    assert_eq!(merged.format.as_deref(), Some("{value}!"));
  }
}
