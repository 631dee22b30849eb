use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use flowgraph_events::{Event, EventKind};

/// What kinds of events a subscriber wants to see.
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
  #[default]
  All,
  Kinds(Vec<EventKind>),
}

impl EventFilter {
  pub fn matches(&self, kind: EventKind) -> bool {
    match self {
      EventFilter::All => true,
      EventFilter::Kinds(kinds) => kinds.contains(&kind),
    }
  }
}

/// A subscriber's bounded mailbox (§4.10). Capacity bounds how many
/// non-terminal events can sit unread; a terminal event is always admitted,
/// evicting the oldest non-terminal entry to make room when the mailbox is
/// full. Terminal events are never themselves evicted to admit a new one.
pub struct SubscriberQueue {
  filter: EventFilter,
  capacity: usize,
  buffer: Mutex<VecDeque<Event>>,
  notify: Notify,
  closed: AtomicBool,
}

impl SubscriberQueue {
  pub fn new(filter: EventFilter, capacity: usize) -> Self {
    Self {
      filter,
      capacity,
      buffer: Mutex::new(VecDeque::new()),
      notify: Notify::new(),
      closed: AtomicBool::new(false),
    }
  }

  /// Offer `event` to this subscriber if it matches its filter, applying
  /// the backpressure policy when the mailbox is full.
  pub fn offer(&self, event: Event) {
    if self.closed.load(Ordering::Acquire) || !self.filter.matches(event.kind) {
      return;
    }

    let mut buffer = self.buffer.lock().expect("subscriber queue mutex poisoned");
    if buffer.len() >= self.capacity {
      if let Some(pos) = buffer.iter().position(|e| !e.kind.is_terminal()) {
        buffer.remove(pos);
      } else if !event.kind.is_terminal() {
        return;
      }
    }
    buffer.push_back(event);
    drop(buffer);
    self.notify.notify_one();
  }

  /// Wait for and return the next event, or `None` once the subscriber has
  /// been unsubscribed and its mailbox drained.
  pub async fn recv(&self) -> Option<Event> {
    loop {
      {
        let mut buffer = self.buffer.lock().expect("subscriber queue mutex poisoned");
        if let Some(event) = buffer.pop_front() {
          return Some(event);
        }
        if self.closed.load(Ordering::Acquire) {
          return None;
        }
      }
      self.notify.notified().await;
    }
  }

  pub fn close(&self) {
    self.closed.store(true, Ordering::Release);
    self.notify.notify_waiters();
  }
}
