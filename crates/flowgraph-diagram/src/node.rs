use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::NodeId;

/// The variant tag that dictates a node's fields and handler (§3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
  Start,
  Endpoint,
  Condition,
  PersonJob,
  PersonBatchJob,
  CodeJob,
  ApiJob,
  Db,
  UserResponse,
  Hook,
  Notion,
  TemplateJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLanguage {
  Python,
  JavaScript,
  Bash,
  Typescript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbOperation {
  Read,
  Write,
  Append,
}

/// `condition` nodes carry either a boolean expression string or a named
/// predicate kind understood by the built-in condition handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionKind {
  Expression { expression: String },
  Predicate { name: String },
}

/// 2D canvas position. Opaque to the core; carried through compile/execute
/// unchanged (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// Type-specific fields for each `NodeType` variant (§3: "tagged variants").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
  Start {
    #[serde(default)]
    trigger_payload: Option<Value>,
  },
  Endpoint {
    #[serde(default)]
    save_to_file: bool,
    #[serde(default)]
    file_name: Option<String>,
  },
  Condition {
    #[serde(flatten)]
    kind: ConditionKind,
  },
  PersonJob {
    #[serde(default)]
    person_id: Option<String>,
    #[serde(default)]
    llm_config: Option<Value>,
    max_iteration: u32,
    #[serde(default)]
    first_only_prompt: Option<String>,
    #[serde(default)]
    default_prompt: Option<String>,
  },
  PersonBatchJob {
    #[serde(default)]
    person_id: Option<String>,
    #[serde(default)]
    llm_config: Option<Value>,
    max_iteration: u32,
    #[serde(default)]
    first_only_prompt: Option<String>,
    #[serde(default)]
    default_prompt: Option<String>,
    batch_size: u32,
  },
  CodeJob {
    language: CodeLanguage,
    code: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
  },
  ApiJob {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default)]
    timeout_ms: Option<u64>,
  },
  Db {
    operation: DbOperation,
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    key: Option<String>,
  },
  UserResponse {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
  },
  Hook {
    hook_type: String,
    #[serde(default)]
    config: Map<String, Value>,
  },
  Notion {
    operation: String,
    #[serde(default)]
    config: Map<String, Value>,
  },
  TemplateJob {
    template: String,
  },
}

fn default_method() -> String {
  "GET".to_string()
}

impl NodeData {
  /// The discriminant tag, used wherever code dispatches on node type
  /// without needing the type-specific fields (readiness checks, default
  /// handle synthesis, default content-type selection).
  pub fn node_type(&self) -> NodeType {
    match self {
      NodeData::Start { .. } => NodeType::Start,
      NodeData::Endpoint { .. } => NodeType::Endpoint,
      NodeData::Condition { .. } => NodeType::Condition,
      NodeData::PersonJob { .. } => NodeType::PersonJob,
      NodeData::PersonBatchJob { .. } => NodeType::PersonBatchJob,
      NodeData::CodeJob { .. } => NodeType::CodeJob,
      NodeData::ApiJob { .. } => NodeType::ApiJob,
      NodeData::Db { .. } => NodeType::Db,
      NodeData::UserResponse { .. } => NodeType::UserResponse,
      NodeData::Hook { .. } => NodeType::Hook,
      NodeData::Notion { .. } => NodeType::Notion,
      NodeData::TemplateJob { .. } => NodeType::TemplateJob,
    }
  }

  pub fn max_iteration(&self) -> u32 {
    match self {
      NodeData::PersonJob { max_iteration, .. } => *max_iteration,
      NodeData::PersonBatchJob { max_iteration, .. } => *max_iteration,
      _ => 1,
    }
  }

  /// Per-node execution deadline, for node types that carry one (§4.7,
  /// "per-node deadline for node types that carry one").
  pub fn timeout_ms(&self) -> Option<u64> {
    match self {
      NodeData::CodeJob { timeout_ms, .. } => *timeout_ms,
      NodeData::ApiJob { timeout_ms, .. } => *timeout_ms,
      NodeData::UserResponse { timeout_ms, .. } => *timeout_ms,
      _ => None,
    }
  }
}

/// A node as authored in a diagram, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainNode {
  pub id: NodeId,
  #[serde(default)]
  pub label: String,
  pub position: Position,
  #[serde(flatten)]
  pub data: NodeData,
  /// Forward-compatible bag for fields the core does not yet model
  /// (§9 Design Notes: "Unknown-future fields live under an explicit
  /// `extensions: map`").
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub extensions: Map<String, Value>,
}

impl DomainNode {
  pub fn node_type(&self) -> NodeType {
    self.data.node_type()
  }
}
