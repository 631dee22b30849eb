use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flowgraph_compiled::{CompiledNode, ExecutableDiagram};
use flowgraph_diagram::{ExecutionId, NodeId};
use flowgraph_events::EventKind;
use flowgraph_resolve::resolve_inputs;
use flowgraph_router::{ControlKind, ControlMessage};
use flowgraph_state::{ExecutionState, ExecutionStatus, NodeOutput};

use crate::context::SchedulerContext;
use crate::error::SchedulerError;
use crate::options::RunOptions;

/// Runs `diagram` to completion (§4.7). Publishes every event through
/// `ctx.events`/`ctx.router`, drains `control_rx` for `pause`/`resume`/
/// `abort`/`skip_node` between steps, and stops promptly once `cancel` is
/// signalled. Returns the final `ExecutionState` snapshot on success.
pub async fn run(
  ctx: &SchedulerContext,
  diagram: Arc<ExecutableDiagram>,
  execution_id: ExecutionId,
  diagram_id: String,
  opts: RunOptions,
  mut control_rx: mpsc::Receiver<ControlMessage>,
  cancel: CancellationToken,
) -> Result<ExecutionState, SchedulerError> {
  let mut initial = ExecutionState::new(execution_id.clone(), &diagram, diagram_id, opts.max_iterations);
  initial.variables = opts.variables.clone();
  ctx.states.put(execution_id.clone(), initial).await;
  emit(ctx, &execution_id, EventKind::ExecutionStarted, None, Value::Null).await;

  let outcome = tokio::select! {
    result = step_loop(ctx, &diagram, &execution_id, &opts, &mut control_rx, &cancel) => result,
    _ = tokio::time::sleep(opts.timeout()) => Err(SchedulerError::ExecutionTimedOut),
  };

  finalize(ctx, &execution_id, &outcome).await;

  match outcome {
    Ok(()) => Ok(ctx
      .states
      .snapshot(&execution_id)
      .await
      .expect("state recorded at the start of run()")),
    Err(err) => Err(err),
  }
}

async fn finalize(ctx: &SchedulerContext, execution_id: &ExecutionId, outcome: &Result<(), SchedulerError>) {
  let (status, kind) = match outcome {
    Ok(()) => (ExecutionStatus::Completed, EventKind::ExecutionCompleted),
    Err(SchedulerError::Aborted) => (ExecutionStatus::Aborted, EventKind::ExecutionAborted),
    Err(_) => (ExecutionStatus::Failed, EventKind::ExecutionFailed),
  };

  ctx
    .states
    .with_mut(execution_id, |state| {
      state.status = status;
      state.ended_at = Some(chrono::Utc::now());
    })
    .await;

  let data = match outcome {
    Err(err) => json!({ "error": err.to_string() }),
    Ok(()) => Value::Null,
  };
  emit(ctx, execution_id, kind, None, data).await;
}

/// The step loop itself (§4.7 "Step algorithm"): query readiness, dispatch
/// a bounded batch concurrently, record and publish results, repeat.
async fn step_loop(
  ctx: &SchedulerContext,
  diagram: &Arc<ExecutableDiagram>,
  execution_id: &ExecutionId,
  opts: &RunOptions,
  control_rx: &mut mpsc::Receiver<ControlMessage>,
  cancel: &CancellationToken,
) -> Result<(), SchedulerError> {
  let mut paused = false;
  let mut empty_polls = 0u32;
  let mut step_index = 0u64;

  loop {
    if cancel.is_cancelled() {
      return Err(SchedulerError::Aborted);
    }

    drain_control(ctx, execution_id, control_rx, &mut paused).await?;
    if paused {
      wait_for_resume(control_rx, &mut paused, cancel).await?;
      continue;
    }

    let ready = ctx
      .states
      .with_mut(execution_id, |state| state.ready_nodes(diagram))
      .await
      .ok_or_else(|| SchedulerError::DeadlockDetected(0))?;

    if ready.is_empty() {
      let complete = ctx
        .states
        .snapshot(execution_id)
        .await
        .map(|state| state.is_complete(diagram))
        .unwrap_or(false);
      if complete {
        return Ok(());
      }

      empty_polls += 1;
      if empty_polls >= opts.max_poll_retries {
        return Err(SchedulerError::DeadlockDetected(empty_polls));
      }
      tokio::select! {
        _ = tokio::time::sleep(opts.poll_interval()) => {}
        _ = cancel.cancelled() => return Err(SchedulerError::Aborted),
      }
      continue;
    }
    empty_polls = 0;

    let batch: Vec<CompiledNode> = ready
      .into_iter()
      .take(opts.max_parallel_nodes)
      .filter_map(|id| diagram.get_node(&id).cloned())
      .collect();

    for node in &batch {
      let _ = ctx.states.with_mut(execution_id, |state| state.mark_running(&node.id)).await;
      emit(ctx, execution_id, EventKind::NodeStarted, Some(node.id.clone()), Value::Null).await;
    }

    let snapshot = Arc::new(
      ctx
        .states
        .snapshot(execution_id)
        .await
        .expect("execution state exists for the duration of step_loop"),
    );

    let mut handles = Vec::with_capacity(batch.len());
    for node in batch {
      let handlers = ctx.handlers.clone();
      let services = ctx.services.clone();
      let diagram = diagram.clone();
      let snapshot = snapshot.clone();
      handles.push(tokio::spawn(dispatch_node(handlers, services, diagram, snapshot, node)));
    }

    let joined = tokio::select! {
      results = futures::future::join_all(handles) => results,
      _ = cancel.cancelled() => return Err(SchedulerError::Aborted),
    };

    let mut step_failure: Option<NodeId> = None;
    let mut executed = Vec::with_capacity(joined.len());
    for result in joined {
      let (node_id, outcome) = match result {
        Ok(pair) => pair,
        Err(join_err) => {
          tracing::error!(error = %join_err, "node task panicked before returning a result");
          continue;
        }
      };

      match outcome {
        Ok(output) => {
          let event_data = serde_json::to_value(&output).unwrap_or(Value::Null);
          let _ = ctx.states.with_mut(execution_id, |state| state.mark_complete(&node_id, diagram, output)).await;
          emit(ctx, execution_id, EventKind::NodeCompleted, Some(node_id.clone()), event_data).await;
          executed.push(node_id);
        }
        Err(message) => {
          let _ = ctx.states.with_mut(execution_id, |state| state.mark_failed(&node_id, message.clone())).await;
          emit(ctx, execution_id, EventKind::NodeFailed, Some(node_id.clone()), json!({ "error": message })).await;
          step_failure = Some(node_id);
        }
      }
    }

    emit(
      ctx,
      execution_id,
      EventKind::StateChanged,
      None,
      json!({ "step": step_index, "executed": executed }),
    )
    .await;
    step_index += 1;

    // Fail-fast at node granularity (§4.7): a failure doesn't stop
    // siblings already in flight, but if nothing is left to run
    // afterward the whole execution is a failure.
    if let Some(failed_node) = step_failure {
      let next_ready = ctx
        .states
        .with_mut(execution_id, |state| state.ready_nodes(diagram))
        .await
        .unwrap_or_default();
      if next_ready.is_empty() {
        return Err(SchedulerError::ExecutionFailed(failed_node));
      }
    }
  }
}

async fn dispatch_node(
  handlers: Arc<flowgraph_handlers::HandlerRegistry>,
  services: flowgraph_handlers::ServiceBundle,
  diagram: Arc<ExecutableDiagram>,
  snapshot: Arc<ExecutionState>,
  node: CompiledNode,
) -> (NodeId, Result<NodeOutput, String>) {
  // Execution-wide `variables` (§6 "Scheduler input") are available to every
  // node as a base layer; edge-resolved inputs of the same key win, since
  // they reflect upstream node output rather than the run's initial seed.
  let mut inputs = snapshot.variables.clone();
  inputs.extend(resolve_inputs(&node, &diagram, &snapshot));
  let dispatch = handlers.dispatch(&node, &inputs, &services);

  let outcome = match node.data.timeout_ms() {
    Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), dispatch).await {
      Ok(result) => result.map_err(|e| e.to_string()),
      Err(_) => Err("node exceeded its per-node timeout".to_string()),
    },
    None => dispatch.await.map_err(|e| e.to_string()),
  };

  (node.id, outcome)
}

/// Non-blocking drain of every pending control message (§5, §6). `abort`
/// short-circuits the whole loop; `pause`/`resume` toggle `paused`;
/// `skip_node` marks a pending node `skipped` directly; `interactive_response`
/// and unrecognized kinds are observed but not acted on, since no built-in
/// handler parks a node waiting for one.
async fn drain_control(
  ctx: &SchedulerContext,
  execution_id: &ExecutionId,
  control_rx: &mut mpsc::Receiver<ControlMessage>,
  paused: &mut bool,
) -> Result<(), SchedulerError> {
  loop {
    let message = match control_rx.try_recv() {
      Ok(message) => message,
      Err(_) => return Ok(()),
    };
    if &message.execution_id != execution_id {
      continue;
    }

    match &message.kind {
      ControlKind::Abort => return Err(SchedulerError::Aborted),
      ControlKind::Pause => *paused = true,
      ControlKind::Resume => *paused = false,
      ControlKind::SkipNode => {
        if let Some(node_id) = message.node_id {
          let _ = ctx.states.with_mut(execution_id, |state| state.skip_node(&node_id)).await;
          emit(ctx, execution_id, EventKind::NodeSkipped, Some(node_id), Value::Null).await;
        }
      }
      ControlKind::InteractiveResponse => {
        emit(ctx, execution_id, EventKind::InteractiveResponse, message.node_id, message.data).await;
      }
      ControlKind::Other => {
        tracing::warn!(kind = ?message.kind, "ignoring unrecognized control message");
      }
    }
  }
}

/// Blocks the step loop between steps while paused, per §4.7 ("`pause`
/// blocks the step loop between steps until `resume`").
async fn wait_for_resume(
  control_rx: &mut mpsc::Receiver<ControlMessage>,
  paused: &mut bool,
  cancel: &CancellationToken,
) -> Result<(), SchedulerError> {
  while *paused {
    tokio::select! {
      message = control_rx.recv() => match message {
        Some(message) => match message.kind {
          ControlKind::Resume => *paused = false,
          ControlKind::Abort => return Err(SchedulerError::Aborted),
          _ => {}
        },
        None => return Err(SchedulerError::Aborted),
      },
      _ = cancel.cancelled() => return Err(SchedulerError::Aborted),
    }
  }
  Ok(())
}

async fn emit(ctx: &SchedulerContext, execution_id: &ExecutionId, kind: EventKind, node_id: Option<NodeId>, data: Value) {
  let event = ctx.events.append(execution_id.clone(), kind, node_id, data).await;
  ctx.router.broadcast(execution_id, event);
}
