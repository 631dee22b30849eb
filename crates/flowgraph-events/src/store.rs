use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use flowgraph_diagram::{ExecutionId, NodeId};

use crate::error::EventError;
use crate::event::{Event, EventKind};

/// Append-only per-execution log with a monotonically increasing
/// `sequence` (§4.9). Safe for concurrent callers; appends are serialized
/// by an internal mutex, same as `fuschia-engine`'s channel notifier
/// serializes delivery through a single sender.
#[derive(Default)]
pub struct EventStore {
  executions: Mutex<HashMap<ExecutionId, Vec<Event>>>,
}

impl EventStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn append(&self, execution_id: ExecutionId, kind: EventKind, node_id: Option<NodeId>, data: Value) -> Event {
    let mut executions = self.executions.lock().await;
    let log = executions.entry(execution_id.clone()).or_default();
    let sequence = log.last().map(|e| e.sequence + 1).unwrap_or(0);
    let event = Event {
      execution_id,
      sequence,
      kind,
      node_id,
      timestamp: Utc::now(),
      data,
    };
    log.push(event.clone());
    event
  }

  /// All events for `execution_id`, optionally only those with `sequence >
  /// since_sequence`.
  pub async fn events(&self, execution_id: &ExecutionId, since_sequence: Option<u64>) -> Vec<Event> {
    let executions = self.executions.lock().await;
    let Some(log) = executions.get(execution_id) else {
      return Vec::new();
    };
    match since_sequence {
      Some(since) => log.iter().filter(|e| e.sequence > since).cloned().collect(),
      None => log.clone(),
    }
  }

  pub async fn has_execution(&self, execution_id: &ExecutionId) -> bool {
    self.executions.lock().await.contains_key(execution_id)
  }
}

pub(crate) fn unknown_execution(id: &ExecutionId) -> EventError {
  EventError::UnknownExecution(id.clone())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn sequence_numbers_increase_monotonically_per_execution() {
    let store = EventStore::new();
    let id = ExecutionId::from("e1");
    let e0 = store.append(id.clone(), EventKind::ExecutionStarted, None, Value::Null).await;
    let e1 = store.append(id.clone(), EventKind::NodeStarted, None, Value::Null).await;
    assert_eq!(e0.sequence, 0);
    assert_eq!(e1.sequence, 1);
  }

  #[tokio::test]
  async fn since_sequence_filters_earlier_events() {
    let store = EventStore::new();
    let id = ExecutionId::from("e1");
    store.append(id.clone(), EventKind::ExecutionStarted, None, Value::Null).await;
    store.append(id.clone(), EventKind::NodeStarted, None, Value::Null).await;
    let recent = store.events(&id, Some(0)).await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].sequence, 1);
  }

  #[tokio::test]
  async fn separate_executions_have_independent_sequences() {
    let store = EventStore::new();
    let a = ExecutionId::from("a");
    let b = ExecutionId::from("b");
    store.append(a.clone(), EventKind::ExecutionStarted, None, Value::Null).await;
    let first_b = store.append(b.clone(), EventKind::ExecutionStarted, None, Value::Null).await;
    assert_eq!(first_b.sequence, 0);
  }
}
