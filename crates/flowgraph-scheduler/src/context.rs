use std::sync::Arc;

use flowgraph_events::{EventStore, StateStore};
use flowgraph_handlers::{HandlerRegistry, ServiceBundle};
use flowgraph_router::MessageRouter;

/// Everything the step loop needs that outlives a single run: the handler
/// registry, the service bundle handed to every dispatch, and the shared
/// stores/router a host keeps across many executions.
#[derive(Clone)]
pub struct SchedulerContext {
  pub handlers: Arc<HandlerRegistry>,
  pub services: ServiceBundle,
  pub events: Arc<EventStore>,
  pub states: Arc<StateStore>,
  pub router: Arc<MessageRouter>,
}
