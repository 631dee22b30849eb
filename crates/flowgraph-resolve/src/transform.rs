use serde_json::Value;

use flowgraph_diagram::{ContentType, TransformRule};

/// Apply the recognized rules of `rule` to `value` in the fixed order
/// content-type conversion, variable extraction, format templating,
/// tool-result extraction (§4.5 step 4). Unrecognized rules are ignored,
/// not an error — they are preserved on the edge but never applied.
pub fn apply_transform(rule: &TransformRule, value: Value) -> Value {
  let mut current = apply_content_type(rule, value);
  current = apply_extract_variable(rule, current);
  current = apply_format(rule, current);
  current = apply_extract_tool_results(rule, current);
  current
}

fn apply_content_type(rule: &TransformRule, value: Value) -> Value {
  match rule.content_type {
    Some(ContentType::Object) => match &value {
      Value::String(s) if s.trim_start().starts_with('{') || s.trim_start().starts_with('[') => {
        serde_json::from_str(s).unwrap_or(value)
      }
      _ => value,
    },
    // conversation_state only marks the edge as always-deliverable to
    // person_job targets (§4.5 step 1); it does not change the value.
    _ => value,
  }
}

fn apply_extract_variable(rule: &TransformRule, value: Value) -> Value {
  let Some(name) = &rule.extract_variable else {
    return value;
  };
  match &value {
    Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
    _ => value,
  }
}

fn apply_format(rule: &TransformRule, value: Value) -> Value {
  let Some(template) = &rule.format else {
    return value;
  };
  let value_str = match &value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  };
  let mut rendered = template.replace("{value}", &value_str);
  if let Value::Object(map) = &value {
    for (key, v) in map {
      let placeholder = format!("{{{key}}}");
      let replacement = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      rendered = rendered.replace(&placeholder, &replacement);
    }
  }
  Value::String(rendered)
}

fn apply_extract_tool_results(rule: &TransformRule, value: Value) -> Value {
  if rule.extract_tool_results != Some(true) {
    return value;
  }
  match &value {
    Value::Object(map) => map
      .get("tool_results")
      .or_else(|| map.get("toolResults"))
      .cloned()
      .unwrap_or(value.clone()),
    _ => value,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn object_content_type_parses_json_strings() {
    let rule = TransformRule {
      content_type: Some(ContentType::Object),
      ..Default::default()
    };
    let result = apply_transform(&rule, Value::String("{\"a\": 1}".into()));
    assert_eq!(result, json!({"a": 1}));
  }

  #[test]
  fn extract_variable_pulls_a_field() {
    let rule = TransformRule {
      extract_variable: Some("name".into()),
      ..Default::default()
    };
    let result = apply_transform(&rule, json!({"name": "ada", "age": 30}));
    assert_eq!(result, json!("ada"));
  }

  #[test]
  fn format_substitutes_value_placeholder() {
    let rule = TransformRule {
      format: Some("hello {value}!".into()),
      ..Default::default()
    };
    let result = apply_transform(&rule, Value::String("world".into()));
    assert_eq!(result, json!("hello world!"));
  }

  #[test]
  fn extract_tool_results_pulls_named_field() {
    let rule = TransformRule {
      extract_tool_results: Some(true),
      ..Default::default()
    };
    let result = apply_transform(&rule, json!({"tool_results": ["r1"], "other": 1}));
    assert_eq!(result, json!(["r1"]));
  }

  #[test]
  fn pipeline_applies_rules_in_order() {
    let rule = TransformRule {
      extract_variable: Some("value".into()),
      format: Some("<{value}>".into()),
      ..Default::default()
    };
    let result = apply_transform(&rule, json!({"value": "x"}));
    assert_eq!(result, json!("<x>"));
  }
}
