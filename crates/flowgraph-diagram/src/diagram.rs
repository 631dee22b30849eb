use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::arrow::Arrow;
use crate::handle::{Direction, Handle};
use crate::ids::{HandleId, NodeId};
use crate::node::{DomainNode, NodeType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub llm_config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRef {
  pub id: String,
  #[serde(default)]
  pub service: Option<String>,
}

/// The diagram as authored: nodes and arrows plus optional declared handles,
/// persons, and api keys (§3). Handles omitted by the author are synthesized
/// by `default_handle_names` per §6.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainDiagram {
  pub nodes: Vec<DomainNode>,
  pub arrows: Vec<Arrow>,
  #[serde(default)]
  pub handles: Vec<Handle>,
  #[serde(default)]
  pub persons: Vec<Person>,
  #[serde(default)]
  pub api_keys: Vec<ApiKeyRef>,
  #[serde(default)]
  pub metadata: Map<String, Value>,
}

/// The handle names every node type receives automatically when not
/// explicitly declared by the author (§6: "non-start nodes get an input;
/// non-endpoint nodes get an output; condition nodes additionally get
/// true and false output handles").
pub fn default_handle_names(node_type: NodeType) -> (Vec<&'static str>, Vec<&'static str>) {
  let inputs: Vec<&'static str> = if node_type == NodeType::Start {
    Vec::new()
  } else {
    vec!["default"]
  };
  let outputs: Vec<&'static str> = match node_type {
    NodeType::Endpoint => Vec::new(),
    NodeType::Condition => vec!["condtrue", "condfalse"],
    _ => vec!["default"],
  };
  (inputs, outputs)
}

impl DomainDiagram {
  /// Declared handles for each node, keyed by `(node_id, name, direction)`,
  /// used to decide whether a default handle is still needed.
  fn declared_handle_keys(&self) -> std::collections::HashSet<(NodeId, String, Direction)> {
    self
      .handles
      .iter()
      .map(|h| (h.node_id.clone(), h.name.clone(), h.direction))
      .collect()
  }

  /// Author-declared handles plus the defaults synthesized for every node
  /// that did not declare its own (§6). Declared handles always win; a
  /// default is added only for a `(node, name, direction)` triple absent
  /// from `self.handles`.
  pub fn effective_handles(&self) -> Vec<Handle> {
    let declared = self.declared_handle_keys();
    let mut out = self.handles.clone();
    for node in &self.nodes {
      let (inputs, outputs) = default_handle_names(node.node_type());
      for name in inputs {
        let key = (node.id.clone(), name.to_string(), Direction::Input);
        if !declared.contains(&key) {
          out.push(Handle {
            id: HandleId::from(format!("{}:{}:input", node.id, name)),
            node_id: node.id.clone(),
            name: name.to_string(),
            direction: Direction::Input,
          });
        }
      }
      for name in outputs {
        let key = (node.id.clone(), name.to_string(), Direction::Output);
        if !declared.contains(&key) {
          out.push(Handle {
            id: HandleId::from(format!("{}:{}:output", node.id, name)),
            node_id: node.id.clone(),
            name: name.to_string(),
            direction: Direction::Output,
          });
        }
      }
    }
    out
  }

  pub fn node_by_id(&self, id: &NodeId) -> Option<&DomainNode> {
    self.nodes.iter().find(|n| &n.id == id)
  }

  pub fn nodes_by_id(&self) -> HashMap<NodeId, &DomainNode> {
    self.nodes.iter().map(|n| (n.id.clone(), n)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::{NodeData, Position};

  fn node(id: &str, data: NodeData) -> DomainNode {
    DomainNode {
      id: NodeId::from(id),
      label: String::new(),
      position: Position { x: 0.0, y: 0.0 },
      data,
      extensions: Map::new(),
    }
  }

  #[test]
  fn start_node_has_no_default_input() {
    let diagram = DomainDiagram {
      nodes: vec![node("start", NodeData::Start { trigger_payload: None })],
      ..Default::default()
    };
    let handles = diagram.effective_handles();
    assert!(!handles
      .iter()
      .any(|h| h.node_id.as_str() == "start" && h.direction == Direction::Input));
    assert!(handles
      .iter()
      .any(|h| h.node_id.as_str() == "start" && h.name == "default" && h.direction == Direction::Output));
  }

  #[test]
  fn condition_node_gets_true_false_outputs() {
    let diagram = DomainDiagram {
      nodes: vec![node(
        "cond",
        NodeData::Condition {
          kind: crate::node::ConditionKind::Expression {
            expression: "true".into(),
          },
        },
      )],
      ..Default::default()
    };
    let handles = diagram.effective_handles();
    let names: Vec<_> = handles
      .iter()
      .filter(|h| h.node_id.as_str() == "cond" && h.direction == Direction::Output)
      .map(|h| h.name.as_str())
      .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"condtrue"));
    assert!(names.contains(&"condfalse"));
  }

  #[test]
  fn declared_handle_suppresses_default() {
    let diagram = DomainDiagram {
      nodes: vec![node(
        "job",
        NodeData::CodeJob {
          language: crate::node::CodeLanguage::Python,
          code: "pass".into(),
          timeout_ms: None,
        },
      )],
      handles: vec![Handle {
        id: HandleId::from("job:custom:output"),
        node_id: NodeId::from("job"),
        name: "custom".into(),
        direction: Direction::Output,
      }],
      ..Default::default()
    };
    let handles = diagram.effective_handles();
    let outputs: Vec<_> = handles
      .iter()
      .filter(|h| h.node_id.as_str() == "job" && h.direction == Direction::Output)
      .collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name, "custom");
  }
}
