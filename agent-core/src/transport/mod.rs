//! `transport` moves encrypted envelopes between agents
//!
//! Outbound transports are selected by endpoint scheme. Inbound transports hand raw payloads
//! to the agent together with an optional [`TransportSession`] used for return routes.
pub mod types;
pub use types::{
    endpoint_scheme, InboundReceiver, InboundSender, OutboundPackage, OutboundTransport,
    TransportError, TransportSession,
};

mod session;
pub use session::SessionRegistry;

mod queue;
pub use queue::{InMemoryMessageQueue, MessageQueue};

mod memory;
pub use memory::{MemoryHub, MemoryInbound, MemorySession, MemoryTransport, MEMORY_SCHEME};
