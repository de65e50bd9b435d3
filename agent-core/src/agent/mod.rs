//! `agent` is the coordinator seam of the engine
//!
//! It owns the runtime policy ([`AgentConfig`]), the inbound pipeline ([`MessageReceiver`]
//! and [`Dispatcher`]), the outbound pipeline ([`MessageSender`]) and the [`Agent`] that
//! wires one instance together.
pub mod config;
pub use config::{AgentConfig, AutoAccept, MediatorPickupStrategy, DEFAULT_ENDPOINT};

mod context;
pub use context::{InboundMessageContext, OutboundMessage};

pub mod types;
pub use types::AgentError;

mod dispatcher;
pub use dispatcher::{Dispatcher, MessageHandler};

mod sender;
pub use sender::{has_inbound_endpoint, is_queue_endpoint, EnvelopeKeys, MessageSender};

mod threads;
pub use threads::ThreadLocks;

mod receiver;
pub use receiver::MessageReceiver;

mod runtime;
pub use runtime::{Agent, AgentDependencies};
