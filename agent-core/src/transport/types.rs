use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};
use rst_common::with_tokio::tokio::sync::mpsc;

use crate::wallet::EncryptedMessage;

#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum TransportError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("send error: {0}")]
    SendError(String),

    #[error("session closed: {0}")]
    SessionClosed(String),

    #[error("pack error: {0}")]
    PackError(String),
}

/// `InboundSender` feeds raw payloads back into the owning agent, used for transport
/// responses and picked up batches
pub type InboundSender = mpsc::UnboundedSender<Value>;
pub type InboundReceiver = mpsc::UnboundedReceiver<Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPackage {
    pub payload: EncryptedMessage,
    pub endpoint: Option<String>,
    pub response_requested: bool,
    pub connection_id: Option<String>,
}

/// `OutboundTransport` delivers a package to its endpoint
///
/// A transport returns the payload the peer answered on the same channel, if any
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    fn supported_schemes(&self) -> Vec<String>;
    async fn send(&self, package: OutboundPackage) -> Result<Option<Value>, TransportError>;
}

/// `TransportSession` is the open channel an inbound message arrived on
#[async_trait]
pub trait TransportSession: Send + Sync {
    fn id(&self) -> String;
    fn session_type(&self) -> String;
    async fn send(&self, message: EncryptedMessage) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

pub fn endpoint_scheme(endpoint: &str) -> Option<String> {
    endpoint
        .split_once(':')
        .map(|(scheme, _)| scheme.to_lowercase())
        .filter(|scheme| !scheme.is_empty())
}
