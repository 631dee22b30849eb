use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::{ConditionKind, NodeData};
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Evaluates a `condition` node's boolean outcome and threads its `default`
/// input through to whichever branch fires (§3: "Condition outputs produce
/// no memory inclusion by default").
pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, _: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::Condition { kind } = &node.data else {
      return Err(HandlerError::InvalidShape("condition handler received a non-condition node".into()));
    };

    let outcome = match kind {
      ConditionKind::Expression { expression } => evaluate_expression(expression, inputs)?,
      ConditionKind::Predicate { name } => evaluate_predicate(name, inputs)?,
    };

    let carried = inputs.get("default").cloned().unwrap_or(Value::Null);
    Ok(NodeOutput::condition(outcome, carried.clone(), carried))
  }
}

/// Supports a bare truthy check (`my_var`) or an equality/inequality test
/// (`my_var == "literal"`, `my_var != "literal"`) against a named input;
/// `input`, `value`, and `default` all alias the `default` input key.
fn evaluate_expression(expression: &str, inputs: &Map<String, Value>) -> Result<bool, HandlerError> {
  let expression = expression.trim();

  if let Some((lhs, rhs)) = expression.split_once("==") {
    return Ok(lookup(lhs.trim(), inputs) == parse_literal(rhs.trim()));
  }
  if let Some((lhs, rhs)) = expression.split_once("!=") {
    return Ok(lookup(lhs.trim(), inputs) != parse_literal(rhs.trim()));
  }

  Ok(is_truthy(&lookup(expression, inputs)))
}

fn evaluate_predicate(name: &str, inputs: &Map<String, Value>) -> Result<bool, HandlerError> {
  match name {
    "always_true" => Ok(true),
    "always_false" => Ok(false),
    "is_truthy" => Ok(is_truthy(&lookup("default", inputs))),
    "is_empty" => Ok(is_empty(&lookup("default", inputs))),
    other => Err(HandlerError::InvalidShape(format!("unknown condition predicate \"{other}\""))),
  }
}

fn lookup(name: &str, inputs: &Map<String, Value>) -> Value {
  let key = if matches!(name, "input" | "value") { "default" } else { name };
  inputs.get(key).cloned().unwrap_or(Value::Null)
}

fn parse_literal(raw: &str) -> Value {
  let raw = raw.trim();
  if let Some(unquoted) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
    return Value::String(unquoted.to_string());
  }
  serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

fn is_empty(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_diagram::NodeId;
  use serde_json::json;

  fn node(kind: ConditionKind) -> CompiledNode {
    CompiledNode {
      id: NodeId::from("c"),
      node_type: flowgraph_diagram::NodeType::Condition,
      data: NodeData::Condition { kind },
      max_iteration: 1,
    }
  }

  #[tokio::test]
  async fn equality_expression_matches_default_input() {
    let mut inputs = Map::new();
    inputs.insert("default".into(), json!("yes"));
    let output = ConditionHandler
      .execute(
        &node(ConditionKind::Expression {
          expression: "input == \"yes\"".into(),
        }),
        &inputs,
        &ServiceBundle::default(),
      )
      .await
      .unwrap();
    assert_eq!(output.condition_value(), Some(true));
  }

  #[tokio::test]
  async fn named_predicate_is_empty_checks_default_input() {
    let output = ConditionHandler
      .execute(
        &node(ConditionKind::Predicate { name: "is_empty".into() }),
        &Map::new(),
        &ServiceBundle::default(),
      )
      .await
      .unwrap();
    assert_eq!(output.condition_value(), Some(true));
  }

  #[tokio::test]
  async fn carried_value_matches_default_input_on_either_branch() {
    let mut inputs = Map::new();
    inputs.insert("default".into(), json!(42));
    let output = ConditionHandler
      .execute(
        &node(ConditionKind::Predicate { name: "always_false".into() }),
        &inputs,
        &ServiceBundle::default(),
      )
      .await
      .unwrap();
    assert_eq!(output.value_ref(), &json!(42));
  }
}
