use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a completed node produced. `Standard` wraps an arbitrary value plus
/// optional named output ports; `Condition` is the specialization a
/// `condition` node returns (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeOutput {
  Standard {
    value: Value,
    #[serde(default)]
    outputs: Map<String, Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
  },
  Condition {
    value: bool,
    true_output: Value,
    false_output: Value,
    #[serde(default)]
    metadata: Map<String, Value>,
  },
}

impl NodeOutput {
  pub fn value(value: Value) -> Self {
    NodeOutput::Standard {
      value,
      outputs: Map::new(),
      metadata: Map::new(),
    }
  }

  pub fn condition(value: bool, true_output: Value, false_output: Value) -> Self {
    NodeOutput::Condition {
      value,
      true_output,
      false_output,
      metadata: Map::new(),
    }
  }

  /// The outputs map as the input resolver sees it (§4.5 step 2): a
  /// condition's outcome is synthesized into `condtrue`/`condfalse` keys;
  /// a standard output with an explicit `outputs` field uses it as-is;
  /// otherwise a non-mapping value is logically `{"default": value}`.
  pub fn as_outputs_map(&self) -> Map<String, Value> {
    match self {
      NodeOutput::Condition {
        value,
        true_output,
        false_output,
        ..
      } => {
        let mut map = Map::new();
        if *value {
          map.insert("condtrue".to_string(), true_output.clone());
        } else {
          map.insert("condfalse".to_string(), false_output.clone());
        }
        map
      }
      NodeOutput::Standard { value, outputs, .. } => {
        if !outputs.is_empty() {
          outputs.clone()
        } else if let Value::Object(map) = value {
          map.clone()
        } else {
          let mut map = Map::new();
          map.insert("default".to_string(), value.clone());
          map
        }
      }
    }
  }

  /// The raw value, ignoring named ports — used where a caller wants "the
  /// whole thing" rather than a selected port.
  pub fn value_ref(&self) -> &Value {
    match self {
      NodeOutput::Standard { value, .. } => value,
      NodeOutput::Condition { true_output, value, false_output } => {
        if *value {
          true_output
        } else {
          false_output
        }
      }
    }
  }

  /// The boolean outcome, if this is a condition output.
  pub fn condition_value(&self) -> Option<bool> {
    match self {
      NodeOutput::Condition { value, .. } => Some(*value),
      NodeOutput::Standard { .. } => None,
    }
  }

  /// Handler-reported metadata (§12), e.g. LLM token counts. Folded into
  /// the execution's running `token_usage` on completion.
  pub fn metadata(&self) -> &Map<String, Value> {
    match self {
      NodeOutput::Standard { metadata, .. } => metadata,
      NodeOutput::Condition { metadata, .. } => metadata,
    }
  }
}
