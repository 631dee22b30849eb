use flowgraph_compiled::ExecutableDiagram;
use flowgraph_diagram::ExecutionId;
use flowgraph_state::{ExecutionState, ExecutionStatus, NodeOutput};

use crate::error::EventError;
use crate::event::EventKind;
use crate::store::EventStore;

/// Rebuild an `ExecutionState` purely from the append-only log (§4.9,
/// §8: "replay(E) applied to events(E) yields state equal to snapshot(E)").
/// `max_global_iterations` must match the value the live execution was
/// started with; it isn't itself recorded as an event.
pub async fn replay(
  event_store: &EventStore,
  execution_id: &ExecutionId,
  diagram: &ExecutableDiagram,
  diagram_id: String,
  max_global_iterations: u64,
) -> Result<ExecutionState, EventError> {
  if !event_store.has_execution(execution_id).await {
    return Err(crate::store::unknown_execution(execution_id));
  }

  let mut state = ExecutionState::new(execution_id.clone(), diagram, diagram_id, max_global_iterations);

  for event in event_store.events(execution_id, None).await {
    apply(&mut state, diagram, event)?;
  }

  Ok(state)
}

fn apply(state: &mut ExecutionState, diagram: &ExecutableDiagram, event: crate::event::Event) -> Result<(), EventError> {
  match event.kind {
    EventKind::ExecutionStarted => {}
    EventKind::NodeStarted => {
      if let Some(node_id) = event.node_id {
        state.mark_running(&node_id)?;
      }
    }
    EventKind::NodeRunning | EventKind::InteractivePrompt | EventKind::InteractiveResponse | EventKind::StateChanged => {}
    EventKind::NodeCompleted => {
      if let Some(node_id) = event.node_id {
        let output: NodeOutput = serde_json::from_value(event.data).map_err(|_| EventError::Replay(flowgraph_state::StateError::MissingOutput(node_id.clone())))?;
        state.mark_complete(&node_id, diagram, output)?;
      }
    }
    EventKind::NodeFailed => {
      if let Some(node_id) = event.node_id {
        let message = event.data.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string();
        state.mark_failed(&node_id, message)?;
      }
    }
    EventKind::NodeSkipped => {
      if let Some(node_id) = event.node_id {
        state.skip_node(&node_id)?;
      }
    }
    EventKind::NodePaused => state.status = ExecutionStatus::Paused,
    EventKind::ExecutionCompleted => {
      state.status = ExecutionStatus::Completed;
      state.ended_at = Some(event.timestamp);
    }
    EventKind::ExecutionFailed => {
      state.status = ExecutionStatus::Failed;
      state.ended_at = Some(event.timestamp);
    }
    EventKind::ExecutionAborted => {
      state.status = ExecutionStatus::Aborted;
      state.ended_at = Some(event.timestamp);
    }
  }
  Ok(())
}
