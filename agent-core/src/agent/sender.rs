use std::sync::Arc;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::{debug, warn};

use crate::connections::{ConnectionRecord, DidDoc};
use crate::messaging::{AgentMessage, ReturnRoute, ServiceDecorator};
use crate::routing::messages::Forward;
use crate::transport::{
    endpoint_scheme, InboundSender, MessageQueue, OutboundPackage, OutboundTransport,
    SessionRegistry, TransportError, TransportSession,
};
use crate::wallet::{EncryptedMessage, Wallet};

use super::config::DEFAULT_ENDPOINT;
use super::context::OutboundMessage;

/// `EnvelopeKeys` are the keys used to pack one outbound message
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeKeys {
    pub recipient_keys: Vec<String>,
    pub routing_keys: Vec<String>,
    pub sender_key: Option<String>,
}

pub fn is_queue_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with(DEFAULT_ENDPOINT)
}

/// `has_inbound_endpoint` is false when every service of the document is a queue
pub fn has_inbound_endpoint(did_doc: &DidDoc) -> bool {
    did_doc
        .service
        .iter()
        .any(|service| !is_queue_endpoint(&service.service_endpoint))
}

/// `MessageSender` packs outbound messages and delivers them
///
/// A connection message goes through the session the peer keeps open, otherwise through
/// each service endpoint in priority order, and is queued for pickup when the peer only
/// exposes a queue endpoint
#[derive(Clone)]
pub struct MessageSender {
    wallet: Arc<dyn Wallet>,
    transports: Vec<Arc<dyn OutboundTransport>>,
    sessions: SessionRegistry,
    queue: Arc<dyn MessageQueue>,
    inbound: Option<InboundSender>,
}

impl MessageSender {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        transports: Vec<Arc<dyn OutboundTransport>>,
        sessions: SessionRegistry,
        queue: Arc<dyn MessageQueue>,
        inbound: Option<InboundSender>,
    ) -> Self {
        Self {
            wallet,
            transports,
            sessions,
            queue,
            inbound,
        }
    }

    pub fn sessions(&self) -> SessionRegistry {
        self.sessions.clone()
    }

    pub fn queue(&self) -> Arc<dyn MessageQueue> {
        self.queue.clone()
    }

    /// `push_inbound` hands a raw payload back to the owning agent, used to process the
    /// envelopes of a picked up batch
    pub fn push_inbound(&self, payload: Value) -> Result<(), TransportError> {
        let inbound = self
            .inbound
            .as_ref()
            .ok_or_else(|| TransportError::SessionClosed("inbound channel was missing".to_string()))?;

        inbound
            .send(payload)
            .map_err(|_| TransportError::SessionClosed("inbound channel closed".to_string()))
    }

    /// `pack` encrypts for the recipient then wraps the envelope in a `forward` for each
    /// routing key, the last routing key is the outermost layer
    pub async fn pack(
        &self,
        payload: &AgentMessage,
        keys: &EnvelopeKeys,
    ) -> Result<EncryptedMessage, TransportError> {
        let mut to = keys
            .recipient_keys
            .first()
            .cloned()
            .ok_or_else(|| TransportError::PackError("recipient_keys was missing".to_string()))?;

        let value = payload
            .to_value()
            .map_err(|err| TransportError::PackError(err.to_string()))?;

        let mut encrypted = self
            .wallet
            .encrypt(value, keys.recipient_keys.clone(), keys.sender_key.clone())
            .await
            .map_err(|err| TransportError::PackError(err.to_string()))?;

        for routing_key in &keys.routing_keys {
            let forward = AgentMessage::new(&Forward {
                to: to.to_owned(),
                msg: encrypted,
            })
            .and_then(|message| message.to_value())
            .map_err(|err| TransportError::PackError(err.to_string()))?;

            encrypted = self
                .wallet
                .encrypt(forward, vec![routing_key.to_owned()], None)
                .await
                .map_err(|err| TransportError::PackError(err.to_string()))?;

            to = routing_key.to_owned();
        }

        Ok(encrypted)
    }

    pub async fn send(&self, outbound: OutboundMessage) -> Result<(), TransportError> {
        match outbound {
            OutboundMessage::Connection {
                payload,
                connection,
            } => self.send_message(payload, &connection).await,
            OutboundMessage::Service {
                payload,
                service,
                sender_key,
            } => {
                self.send_message_to_service(payload, &service, sender_key, false)
                    .await
            }
        }
    }

    pub async fn send_message(
        &self,
        payload: AgentMessage,
        connection: &ConnectionRecord,
    ) -> Result<(), TransportError> {
        let payload = if has_inbound_endpoint(&connection.did_doc) {
            payload
        } else {
            payload.with_return_route(ReturnRoute::All)
        };

        let services = connection.their_services();
        if let Some(session) = self.sessions.find(&connection.id).await {
            if let Some(service) = services.first() {
                let keys = EnvelopeKeys {
                    recipient_keys: service.recipient_keys.clone(),
                    routing_keys: Vec::new(),
                    sender_key: Some(connection.verkey.to_owned()),
                };

                match self.send_to_session(session.clone(), &payload, &keys).await {
                    Ok(_) => return Ok(()),
                    Err(err) => {
                        warn!("sender: session {} failed: {}", session.id(), err);
                        self.sessions.remove_session(&session.id()).await;
                    }
                }
            }
        }

        if services.is_empty() {
            return Err(TransportError::SendError(format!(
                "connection {} has no service to send to",
                connection.id
            )));
        }

        let mut queue_service = None;
        for service in services {
            let keys = EnvelopeKeys {
                recipient_keys: service.recipient_keys.clone(),
                routing_keys: service.routing_keys.clone(),
                sender_key: Some(connection.verkey.to_owned()),
            };

            if is_queue_endpoint(&service.service_endpoint) {
                queue_service = Some(keys);
                continue;
            }

            let package = OutboundPackage {
                payload: self.pack(&payload, &keys).await?,
                endpoint: Some(service.service_endpoint.to_owned()),
                response_requested: payload.has_return_route(),
                connection_id: Some(connection.id.to_owned()),
            };

            match self.dispatch_package(package).await {
                Ok(_) => {
                    debug!(
                        "sender: message {} sent to {}",
                        payload.get_type(),
                        service.service_endpoint
                    );
                    return Ok(());
                }
                Err(err) => warn!(
                    "sender: unable to send to {}: {}",
                    service.service_endpoint, err
                ),
            }
        }

        if let Some(keys) = queue_service {
            let encrypted = self.pack(&payload, &keys).await?;
            debug!(
                "sender: message {} queued for connection {}",
                payload.get_type(),
                connection.id
            );
            return self.queue.add(connection.id.to_owned(), encrypted).await;
        }

        Err(TransportError::SendError(format!(
            "unable to send message {} to connection {}",
            payload.get_id(),
            connection.id
        )))
    }

    /// `send_message_to_service` delivers to a `~service` decorator, used by
    /// connection-less exchanges
    pub async fn send_message_to_service(
        &self,
        payload: AgentMessage,
        service: &ServiceDecorator,
        sender_key: String,
        return_route: bool,
    ) -> Result<(), TransportError> {
        let payload = if return_route {
            payload.with_return_route(ReturnRoute::All)
        } else {
            payload
        };

        let keys = EnvelopeKeys {
            recipient_keys: service.recipient_keys.clone(),
            routing_keys: service.routing_keys.clone(),
            sender_key: Some(sender_key),
        };

        let package = OutboundPackage {
            payload: self.pack(&payload, &keys).await?,
            endpoint: Some(service.service_endpoint.to_owned()),
            response_requested: return_route,
            connection_id: None,
        };

        self.dispatch_package(package).await
    }

    pub async fn send_to_session(
        &self,
        session: Arc<dyn TransportSession>,
        payload: &AgentMessage,
        keys: &EnvelopeKeys,
    ) -> Result<(), TransportError> {
        let encrypted = self.pack(payload, keys).await?;
        session.send(encrypted).await
    }

    /// `forward_to_connection` delivers an envelope verbatim, it is never decrypted
    pub async fn forward_to_connection(
        &self,
        message: EncryptedMessage,
        connection: &ConnectionRecord,
    ) -> Result<(), TransportError> {
        if let Some(session) = self.sessions.find(&connection.id).await {
            match session.send(message.clone()).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!("sender: session {} failed: {}", session.id(), err);
                    self.sessions.remove_session(&session.id()).await;
                }
            }
        }

        for service in connection.their_services() {
            if is_queue_endpoint(&service.service_endpoint) {
                continue;
            }

            let package = OutboundPackage {
                payload: message.clone(),
                endpoint: Some(service.service_endpoint.to_owned()),
                response_requested: false,
                connection_id: Some(connection.id.to_owned()),
            };

            if self.dispatch_package(package).await.is_ok() {
                return Ok(());
            }
        }

        debug!("sender: forward queued for connection {}", connection.id);
        self.queue.add(connection.id.to_owned(), message).await
    }

    /// `flush_queue` moves queued envelopes of the connection into the session, one at a time
    ///
    /// When the session refuses a message, that message and everything still queued behind
    /// it are put back in their original order
    pub async fn flush_queue(
        &self,
        connection_id: &str,
        session: Arc<dyn TransportSession>,
    ) -> Result<usize, TransportError> {
        let mut sent = 0;
        loop {
            let mut taken = self.queue.take(connection_id.to_string(), 1).await?;
            let message = match taken.pop() {
                Some(message) => message,
                None => break,
            };

            if let Err(err) = session.send(message.clone()).await {
                let remaining = self.queue.take(connection_id.to_string(), usize::MAX).await?;
                self.queue.add(connection_id.to_string(), message).await?;
                for pending in remaining {
                    self.queue.add(connection_id.to_string(), pending).await?;
                }

                debug!(
                    "sender: session {} accepted {} queued messages before closing",
                    session.id(),
                    sent
                );
                return Err(err);
            }

            sent += 1;
        }

        debug!("sender: flushed {} queued messages to session {}", sent, session.id());
        Ok(sent)
    }

    async fn dispatch_package(&self, package: OutboundPackage) -> Result<(), TransportError> {
        let endpoint = package
            .endpoint
            .clone()
            .ok_or_else(|| TransportError::SendError("endpoint was missing".to_string()))?;

        let scheme = endpoint_scheme(&endpoint)
            .ok_or_else(|| TransportError::UnsupportedScheme(endpoint.to_owned()))?;

        let transport = self
            .transports
            .iter()
            .find(|transport| transport.supported_schemes().contains(&scheme))
            .ok_or_else(|| TransportError::UnsupportedScheme(scheme.to_owned()))?;

        let response = transport.send(package).await?;
        if let (Some(response), Some(inbound)) = (response, &self.inbound) {
            let is_empty = response.is_null()
                || serde_json::to_string(&response)
                    .map(|val| val == "{}")
                    .unwrap_or(true);

            if !is_empty && inbound.send(response).is_err() {
                warn!("sender: inbound channel closed, transport response dropped");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use mockall::mock;
    use rst_common::standard::async_trait::async_trait;
    use rst_common::with_tokio::tokio;

    use crate::basic_messages::BasicMessage;
    use crate::connections::{ConnectionRole, ConnectionState};
    use crate::transport::InMemoryMessageQueue;
    use crate::wallet::LocalWallet;

    mock!(
        FakeTransport{}

        #[async_trait]
        impl OutboundTransport for FakeTransport {
            fn supported_schemes(&self) -> Vec<String>;
            async fn send(&self, package: OutboundPackage) -> Result<Option<Value>, TransportError>;
        }
    );

    async fn build_connection(wallet: &LocalWallet, endpoint: &str, their_key: &str) -> ConnectionRecord {
        let info = wallet.create_did(None).await.unwrap();
        let did_doc = DidDoc::build(&info.did, &info.verkey, &["memory://self".to_string()], &[]);
        let mut connection = ConnectionRecord::new(
            ConnectionRole::Inviter,
            ConnectionState::Completed,
            info.did,
            info.verkey,
            did_doc,
        );

        connection.their_did_doc = Some(DidDoc::build(
            "did:prople:peer",
            their_key,
            &[endpoint.to_string()],
            &[],
        ));
        connection
    }

    fn build_sender(
        wallet: LocalWallet,
        transports: Vec<Arc<dyn OutboundTransport>>,
        queue: InMemoryMessageQueue,
    ) -> MessageSender {
        MessageSender::new(
            Arc::new(wallet),
            transports,
            SessionRegistry::new(),
            Arc::new(queue),
            None,
        )
    }

    fn build_message() -> AgentMessage {
        AgentMessage::new(&BasicMessage::new("hello".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_pack_wraps_forward_per_routing_key() {
        let wallet = LocalWallet::new();
        let mediator = wallet.create_did(None).await.unwrap();
        let recipient = wallet.create_did(None).await.unwrap();
        let sender = build_sender(wallet.clone(), vec![], InMemoryMessageQueue::new());

        let keys = EnvelopeKeys {
            recipient_keys: vec![recipient.verkey.to_owned()],
            routing_keys: vec![mediator.verkey.to_owned()],
            sender_key: None,
        };

        let packed = sender.pack(&build_message(), &keys).await.unwrap();
        let outer = wallet.decrypt(packed).await.unwrap();
        assert_eq!(outer.recipient_key, Some(mediator.verkey));

        let forward = AgentMessage::from_value(outer.plaintext).unwrap();
        let body: Forward = forward.decode().unwrap();
        assert_eq!(body.to, recipient.verkey);

        let inner = wallet.decrypt(body.msg).await.unwrap();
        assert_eq!(inner.plaintext["content"], Value::from("hello"));
    }

    #[tokio::test]
    async fn test_send_message_by_scheme() {
        let wallet = LocalWallet::new();
        let connection = build_connection(&wallet, "https://peer.example", "peer-key").await;

        let mut transport = MockFakeTransport::new();
        transport
            .expect_supported_schemes()
            .returning(|| vec!["http".to_string(), "https".to_string()]);
        transport
            .expect_send()
            .times(1)
            .withf(|package| package.endpoint == Some("https://peer.example".to_string()))
            .returning(|_| Ok(None));

        let sender = build_sender(wallet, vec![Arc::new(transport)], InMemoryMessageQueue::new());
        let sent = sender.send_message(build_message(), &connection).await;
        assert!(!sent.is_err());
    }

    #[tokio::test]
    async fn test_send_message_queued_for_queue_endpoint() {
        let wallet = LocalWallet::new();
        let connection = build_connection(&wallet, DEFAULT_ENDPOINT, "peer-key").await;

        let queue = InMemoryMessageQueue::new();
        let sender = build_sender(wallet, vec![], queue.clone());

        let sent = sender.send_message(build_message(), &connection).await;
        assert!(!sent.is_err());
        assert_eq!(queue.count(connection.id.to_owned()).await.unwrap(), 1);
    }

    mock!(
        FakeSession{}

        #[async_trait]
        impl TransportSession for FakeSession {
            fn id(&self) -> String;
            fn session_type(&self) -> String;
            async fn send(&self, message: EncryptedMessage) -> Result<(), TransportError>;
            async fn close(&self) -> Result<(), TransportError>;
        }
    );

    fn build_envelope(tag: &str) -> EncryptedMessage {
        EncryptedMessage {
            protected: "protected".to_string(),
            iv: "iv".to_string(),
            ciphertext: "ciphertext".to_string(),
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn test_flush_queue_keeps_messages_the_session_refused() {
        let queue = InMemoryMessageQueue::new();
        for tag in ["1", "2", "3"] {
            let _ = queue.add("conn-1".to_string(), build_envelope(tag)).await;
        }

        let mut session = MockFakeSession::new();
        session.expect_id().returning(|| "session-1".to_string());
        let written = Arc::new(AtomicBool::new(false));
        session.expect_send().times(2).returning(move |_| {
            if written.swap(true, Ordering::SeqCst) {
                return Err(TransportError::SessionClosed("reply already written".to_string()));
            }
            Ok(())
        });

        let sender = build_sender(LocalWallet::new(), vec![], queue.clone());
        let flushed = sender.flush_queue("conn-1", Arc::new(session)).await;
        assert!(matches!(flushed.unwrap_err(), TransportError::SessionClosed(_)));

        let left = queue.take("conn-1".to_string(), 10).await.unwrap();
        let tags: Vec<String> = left.into_iter().map(|msg| msg.tag).collect();
        assert_eq!(tags, vec!["2".to_string(), "3".to_string()]);
    }

    #[tokio::test]
    async fn test_flush_queue_delivers_everything() {
        let queue = InMemoryMessageQueue::new();
        for tag in ["1", "2", "3"] {
            let _ = queue.add("conn-1".to_string(), build_envelope(tag)).await;
        }

        let mut session = MockFakeSession::new();
        session.expect_id().returning(|| "session-1".to_string());
        session.expect_send().times(3).returning(|_| Ok(()));

        let sender = build_sender(LocalWallet::new(), vec![], queue.clone());
        let flushed = sender.flush_queue("conn-1", Arc::new(session)).await;
        assert_eq!(flushed.unwrap(), 3);
        assert_eq!(queue.count("conn-1".to_string()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_message_unsupported_scheme() {
        let wallet = LocalWallet::new();
        let connection = build_connection(&wallet, "ws://peer.example", "peer-key").await;

        let sender = build_sender(wallet, vec![], InMemoryMessageQueue::new());
        let sent = sender.send_message(build_message(), &connection).await;
        assert!(matches!(sent.unwrap_err(), TransportError::SendError(_)))
    }
}
