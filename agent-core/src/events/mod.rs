//! `events` delivers state-changed notifications after records are persisted
pub mod types;
pub use types::{AgentEvent, EventError, EventType};

mod bus;
pub use bus::{EventBus, Subscription, SubscriptionToken};
