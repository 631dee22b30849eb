use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::HandlerError;

/// Chat-completion facade a `person_job`/`person_batch_job` host handler
/// would be written against. No built-in handler implements a node against
/// it; it exists so embedders can write one without inventing their own
/// trait (§4.8, "Handler service bundle").
#[async_trait]
pub trait LlmService: Send + Sync {
  async fn complete(&self, person_id: &str, prompt: &str) -> Result<String, HandlerError>;
}

/// File read/write used by `endpoint` (`save_to_file`) and available to
/// host-written handlers.
#[async_trait]
pub trait FileService: Send + Sync {
  async fn write(&self, file_name: &str, value: &Value) -> Result<(), HandlerError>;
  async fn read(&self, file_name: &str) -> Result<Value, HandlerError>;
}

/// Notion API facade for a host-written `notion` handler.
#[async_trait]
pub trait NotionService: Send + Sync {
  async fn call(&self, operation: &str, config: &serde_json::Map<String, Value>) -> Result<Value, HandlerError>;
}

/// Keyed variable storage backing `db` nodes.
#[async_trait]
pub trait MemoryService: Send + Sync {
  async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, HandlerError>;
  async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), HandlerError>;
  async fn append(&self, collection: &str, key: &str, value: Value) -> Result<(), HandlerError>;
}

/// Lookup of provider credentials, keyed by the `api_keys` names carried on
/// a `DomainDiagram`.
#[async_trait]
pub trait ApiKeyService: Send + Sync {
  async fn resolve(&self, name: &str) -> Result<Option<String>, HandlerError>;
}

/// The named services a dispatch call makes available. A handler only sees
/// the services it declares in `required_services` (§4.8).
#[derive(Clone, Default)]
pub struct ServiceBundle {
  pub llm: Option<Arc<dyn LlmService>>,
  pub file: Option<Arc<dyn FileService>>,
  pub notion: Option<Arc<dyn NotionService>>,
  pub memory: Option<Arc<dyn MemoryService>>,
  pub api_keys: Option<Arc<dyn ApiKeyService>>,
}

impl ServiceBundle {
  pub fn has(&self, name: &str) -> bool {
    match name {
      "llm" => self.llm.is_some(),
      "file" => self.file.is_some(),
      "notion" => self.notion.is_some(),
      "memory" => self.memory.is_some(),
      "api_keys" => self.api_keys.is_some(),
      _ => false,
    }
  }
}

/// An in-process `MemoryService` for tests and single-host deployments:
/// collections are plain maps, guarded by one mutex.
#[derive(Default)]
pub struct InMemoryMemoryService {
  store: Mutex<HashMap<(String, String), Value>>,
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
  async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, HandlerError> {
    let store = self.store.lock().await;
    Ok(store.get(&(collection.to_string(), key.to_string())).cloned())
  }

  async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), HandlerError> {
    let mut store = self.store.lock().await;
    store.insert((collection.to_string(), key.to_string()), value);
    Ok(())
  }

  async fn append(&self, collection: &str, key: &str, value: Value) -> Result<(), HandlerError> {
    let mut store = self.store.lock().await;
    let entry = store.entry((collection.to_string(), key.to_string())).or_insert(Value::Array(Vec::new()));
    match entry {
      Value::Array(items) => items.push(value),
      other => *other = Value::Array(vec![other.clone(), value]),
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn in_memory_memory_service_round_trips() {
    let service = InMemoryMemoryService::default();
    service.put("users", "1", Value::String("ada".into())).await.unwrap();
    assert_eq!(service.get("users", "1").await.unwrap(), Some(Value::String("ada".into())));
  }

  #[tokio::test]
  async fn append_collects_into_an_array() {
    let service = InMemoryMemoryService::default();
    service.append("log", "a", Value::from(1)).await.unwrap();
    service.append("log", "a", Value::from(2)).await.unwrap();
    assert_eq!(service.get("log", "a").await.unwrap(), Some(serde_json::json!([1, 2])));
  }
}
