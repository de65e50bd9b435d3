//! `transport` carries encrypted envelopes over HTTP
//!
//! [`HttpOutboundTransport`] posts envelopes with reqwest, [`inbound`] exposes the axum
//! route receiving them. A reply written to an [`HttpSession`] while the request is being
//! processed is returned as the HTTP response body.
pub const DIDCOMM_CONTENT_TYPE: &str = "application/didcomm-envelope-enc";

mod outbound;
pub use outbound::HttpOutboundTransport;

mod session;
pub use session::HttpSession;

pub mod inbound;
