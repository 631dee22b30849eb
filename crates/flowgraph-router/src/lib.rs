mod control;
mod router;
mod subscriber;

pub use control::{ControlKind, ControlMessage};
pub use router::{MessageRouter, Subscription, SubscriptionId};
pub use subscriber::EventFilter;
