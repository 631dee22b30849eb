mod error;
mod event;
mod replay;
mod state_store;
mod store;

pub use error::EventError;
pub use event::{Event, EventKind};
pub use replay::replay;
pub use state_store::StateStore;
pub use store::EventStore;
