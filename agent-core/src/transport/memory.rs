use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::{self, Value};
use rst_common::standard::uuid::Uuid;
use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::sync::{mpsc, RwLock};

use crate::wallet::EncryptedMessage;

use super::types::{InboundSender, OutboundPackage, OutboundTransport, TransportError, TransportSession};

pub const MEMORY_SCHEME: &str = "memory";

/// `MemoryInbound` is a payload delivered through a [`MemoryHub`] endpoint
pub struct MemoryInbound {
    pub payload: Value,
    pub session: MemorySession,
}

/// `MemoryHub` connects agents living in the same process, endpoints look like
/// `memory://<name>`
#[derive(Clone, Default)]
pub struct MemoryHub {
    endpoints: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<MemoryInbound>>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, endpoint: &str) -> mpsc::UnboundedReceiver<MemoryInbound> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.endpoints
            .write()
            .await
            .insert(endpoint.to_string(), sender);
        receiver
    }

    pub async fn unregister(&self, endpoint: &str) {
        self.endpoints.write().await.remove(endpoint);
    }

    async fn deliver(&self, endpoint: &str, inbound: MemoryInbound) -> Result<(), TransportError> {
        let endpoints = self.endpoints.read().await;
        let sender = endpoints
            .get(endpoint)
            .ok_or_else(|| TransportError::SendError(format!("unknown endpoint {}", endpoint)))?;

        sender
            .send(inbound)
            .map_err(|_| TransportError::SendError(format!("endpoint {} is closed", endpoint)))
    }
}

/// `MemoryTransport` is the outbound side of a [`MemoryHub`] for one agent
///
/// Replies written to the session opened on the receiving side come back through `reply`
#[derive(Clone)]
pub struct MemoryTransport {
    hub: MemoryHub,
    reply: InboundSender,
}

impl MemoryTransport {
    pub fn new(hub: MemoryHub, reply: InboundSender) -> Self {
        Self { hub, reply }
    }
}

#[async_trait]
impl OutboundTransport for MemoryTransport {
    fn supported_schemes(&self) -> Vec<String> {
        vec![MEMORY_SCHEME.to_string()]
    }

    async fn send(&self, package: OutboundPackage) -> Result<Option<Value>, TransportError> {
        let endpoint = package
            .endpoint
            .ok_or_else(|| TransportError::SendError("endpoint was missing".to_string()))?;

        let payload = serde_json::to_value(&package.payload)
            .map_err(|err| TransportError::PackError(err.to_string()))?;

        debug!("memory transport: send to {}", endpoint);
        self.hub
            .deliver(
                &endpoint,
                MemoryInbound {
                    payload,
                    session: MemorySession::new(self.reply.clone()),
                },
            )
            .await?;

        Ok(None)
    }
}

pub struct MemorySession {
    id: String,
    reply: InboundSender,
    closed: AtomicBool,
}

impl MemorySession {
    pub fn new(reply: InboundSender) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            reply,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TransportSession for MemorySession {
    fn id(&self) -> String {
        self.id.to_owned()
    }

    fn session_type(&self) -> String {
        MEMORY_SCHEME.to_string()
    }

    async fn send(&self, message: EncryptedMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed(self.id.to_owned()));
        }

        let payload = serde_json::to_value(&message)
            .map_err(|err| TransportError::PackError(err.to_string()))?;

        self.reply
            .send(payload)
            .map_err(|_| TransportError::SessionClosed(self.id.to_owned()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::with_tokio::tokio;

    fn build_package(endpoint: Option<&str>) -> OutboundPackage {
        OutboundPackage {
            payload: EncryptedMessage {
                protected: "protected".to_string(),
                iv: "iv".to_string(),
                ciphertext: "ciphertext".to_string(),
                tag: "tag".to_string(),
            },
            endpoint: endpoint.map(|val| val.to_string()),
            response_requested: false,
            connection_id: None,
        }
    }

    #[tokio::test]
    async fn test_deliver_and_reply_through_session() {
        let hub = MemoryHub::new();
        let mut bob_inbound = hub.register("memory://bob").await;

        let (alice_reply, mut alice_inbound) = mpsc::unbounded_channel();
        let transport = MemoryTransport::new(hub, alice_reply);

        let sent = transport.send(build_package(Some("memory://bob"))).await;
        assert!(!sent.is_err());

        let inbound = bob_inbound.recv().await.unwrap();
        assert_eq!(inbound.payload["tag"], Value::from("tag"));

        let replied = inbound.session.send(build_package(None).payload).await;
        assert!(!replied.is_err());
        assert!(alice_inbound.recv().await.is_some());

        let _ = inbound.session.close().await;
        let closed = inbound.session.send(build_package(None).payload).await;
        assert!(matches!(closed.unwrap_err(), TransportError::SessionClosed(_)))
    }

    #[tokio::test]
    async fn test_send_unknown_endpoint() {
        let (reply, _inbound) = mpsc::unbounded_channel();
        let transport = MemoryTransport::new(MemoryHub::new(), reply);

        let sent = transport.send(build_package(Some("memory://nobody"))).await;
        assert!(matches!(sent.unwrap_err(), TransportError::SendError(_)));

        let missing = transport.send(build_package(None)).await;
        assert!(matches!(missing.unwrap_err(), TransportError::SendError(_)))
    }
}
