use std::collections::HashMap;

use tokio::sync::Mutex;

use flowgraph_diagram::ExecutionId;
use flowgraph_state::ExecutionState;

/// Authoritative live state per execution (§4.9: "the state snapshot is the
/// authoritative live state"). The scheduler is the sole writer; readers
/// get a clone via `snapshot`.
#[derive(Default)]
pub struct StateStore {
  states: Mutex<HashMap<ExecutionId, ExecutionState>>,
}

impl StateStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn put(&self, execution_id: ExecutionId, state: ExecutionState) {
    self.states.lock().await.insert(execution_id, state);
  }

  /// Run `mutate` against the stored state, if present.
  pub async fn with_mut<R>(&self, execution_id: &ExecutionId, mutate: impl FnOnce(&mut ExecutionState) -> R) -> Option<R> {
    let mut states = self.states.lock().await;
    states.get_mut(execution_id).map(mutate)
  }

  pub async fn snapshot(&self, execution_id: &ExecutionId) -> Option<ExecutionState> {
    self.states.lock().await.get(execution_id).map(clone_state)
  }
}

/// `ExecutionState` doesn't derive `Clone` (its readiness cache is an
/// implementation detail, not part of its identity), so a snapshot is
/// rebuilt from its serializable fields via a JSON round trip.
fn clone_state(state: &ExecutionState) -> ExecutionState {
  let value = serde_json::to_value(state).expect("ExecutionState always serializes");
  serde_json::from_value(value).expect("ExecutionState round-trips through its own serialization")
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowgraph_compiled::ExecutableDiagram;
  use serde_json::Map;
  use std::collections::HashMap as StdHashMap;

  fn empty_diagram() -> ExecutableDiagram {
    ExecutableDiagram::new(vec![], vec![], vec![], vec![], Map::new(), StdHashMap::new())
  }

  #[tokio::test]
  async fn snapshot_reflects_the_stored_state() {
    let store = StateStore::new();
    let diagram = empty_diagram();
    let id = ExecutionId::from("e1");
    let state = ExecutionState::new(id.clone(), &diagram, "d1".into(), 10);
    store.put(id.clone(), state).await;

    let snapshot = store.snapshot(&id).await.unwrap();
    assert_eq!(snapshot.id, id);
  }

  #[tokio::test]
  async fn missing_execution_has_no_snapshot() {
    let store = StateStore::new();
    assert!(store.snapshot(&ExecutionId::from("missing")).await.is_none());
  }
}
