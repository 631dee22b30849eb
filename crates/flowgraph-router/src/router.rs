use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use flowgraph_diagram::ExecutionId;
use flowgraph_events::Event;

use crate::control::ControlMessage;
use crate::subscriber::{EventFilter, SubscriberQueue};

/// Opaque handle returned by `subscribe`, needed to `unsubscribe` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription: `recv().await` for the next matching event.
pub struct Subscription {
  pub id: SubscriptionId,
  queue: Arc<SubscriberQueue>,
}

impl Subscription {
  pub async fn recv(&self) -> Option<Event> {
    self.queue.recv().await
  }
}

const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Fans out appended events to every matching subscriber of an execution
/// and relays control messages to whoever owns the scheduler's receiving
/// end (§4.10). One router instance is shared across all executions a
/// process is running.
pub struct MessageRouter {
  subscribers: Mutex<HashMap<ExecutionId, HashMap<SubscriptionId, Arc<SubscriberQueue>>>>,
  next_id: AtomicU64,
  control_tx: mpsc::Sender<ControlMessage>,
}

impl MessageRouter {
  /// Builds a router and the receiver its owner (typically the scheduler)
  /// drains for control messages.
  pub fn new(control_buffer: usize) -> (Self, mpsc::Receiver<ControlMessage>) {
    let (control_tx, control_rx) = mpsc::channel(control_buffer);
    (
      Self {
        subscribers: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(0),
        control_tx,
      },
      control_rx,
    )
  }

  pub fn subscribe(&self, execution_id: ExecutionId, filter: EventFilter) -> Subscription {
    self.subscribe_with_capacity(execution_id, filter, DEFAULT_MAILBOX_CAPACITY)
  }

  pub fn subscribe_with_capacity(&self, execution_id: ExecutionId, filter: EventFilter, capacity: usize) -> Subscription {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let queue = Arc::new(SubscriberQueue::new(filter, capacity));

    let mut subscribers = self.subscribers.lock().expect("router mutex poisoned");
    subscribers.entry(execution_id).or_default().insert(id, queue.clone());

    Subscription { id, queue }
  }

  pub fn unsubscribe(&self, execution_id: &ExecutionId, id: SubscriptionId) {
    let mut subscribers = self.subscribers.lock().expect("router mutex poisoned");
    if let Some(per_execution) = subscribers.get_mut(execution_id) {
      if let Some(queue) = per_execution.remove(&id) {
        queue.close();
      }
      if per_execution.is_empty() {
        subscribers.remove(execution_id);
      }
    }
  }

  /// Offer `event` to every subscriber of `execution_id` whose filter
  /// matches it (§4.10: "fans out every appended event to all matching
  /// subscribers").
  pub fn broadcast(&self, execution_id: &ExecutionId, event: Event) {
    let subscribers = self.subscribers.lock().expect("router mutex poisoned");
    let Some(per_execution) = subscribers.get(execution_id) else {
      return;
    };
    for queue in per_execution.values() {
      queue.offer(event.clone());
    }
  }

  /// Submit a control message (`pause`/`resume`/`abort`/`skip_node`/
  /// `interactive_response`) for the scheduler to act on. Fails silently
  /// (logging is the caller's job) if the scheduler's receiver has been
  /// dropped.
  pub async fn send_control(&self, message: ControlMessage) {
    let _ = self.control_tx.send(message).await;
  }

  pub fn control_sender(&self) -> mpsc::Sender<ControlMessage> {
    self.control_tx.clone()
  }
}
