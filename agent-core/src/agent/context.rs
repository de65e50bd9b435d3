use std::sync::Arc;

use crate::connections::{ConnectionError, ConnectionRecord};
use crate::messaging::{AgentMessage, MessageError, ServiceDecorator};
use crate::transport::TransportSession;

/// `InboundMessageContext` is a decrypted message together with what the receiver learned
/// about its origin
#[derive(Clone)]
pub struct InboundMessageContext {
    pub message: AgentMessage,
    pub connection: Option<ConnectionRecord>,
    pub sender_key: Option<String>,
    pub recipient_key: Option<String>,
    pub session: Option<Arc<dyn TransportSession>>,
}

impl InboundMessageContext {
    pub fn new(message: AgentMessage) -> Self {
        Self {
            message,
            connection: None,
            sender_key: None,
            recipient_key: None,
            session: None,
        }
    }

    pub fn with_connection(mut self, connection: Option<ConnectionRecord>) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_keys(mut self, sender_key: Option<String>, recipient_key: Option<String>) -> Self {
        self.sender_key = sender_key;
        self.recipient_key = recipient_key;
        self
    }

    pub fn with_session(mut self, session: Option<Arc<dyn TransportSession>>) -> Self {
        self.session = session;
        self
    }

    pub fn connection_id(&self) -> Option<String> {
        self.connection.as_ref().map(|conn| conn.id.to_owned())
    }

    /// `assert_ready_connection` requires a connection that finished the request/response
    /// exchange
    pub fn assert_ready_connection(&self) -> Result<ConnectionRecord, ConnectionError> {
        let connection = self.connection.clone().ok_or_else(|| {
            ConnectionError::ValidationError(format!(
                "no connection associated with incoming message {}",
                self.message.get_type()
            ))
        })?;

        if !connection.is_ready() {
            return Err(ConnectionError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            )));
        }

        Ok(connection)
    }

    /// `assert_connection_or_service_decorator` accepts a message arriving either on a
    /// ready connection, or connection-less with keys matching the `~service` decorators
    /// exchanged earlier in the thread
    pub fn assert_connection_or_service_decorator(
        &self,
        previous_received: Option<&AgentMessage>,
        previous_sent: Option<&AgentMessage>,
    ) -> Result<(), MessageError> {
        if self.connection.is_some() {
            return self
                .assert_ready_connection()
                .map(|_| ())
                .map_err(|err| MessageError::ValidationError(vec![err.to_string()]));
        }

        let recipient_key = self.recipient_key.clone().ok_or_else(|| {
            MessageError::ValidationError(vec![
                "recipient key was missing for connection-less message".to_string(),
            ])
        })?;

        let contains = |service: Option<ServiceDecorator>, key: &str| {
            service
                .map(|svc| svc.recipient_keys.iter().any(|val| val == key))
                .unwrap_or(true)
        };

        if let Some(sent) = previous_sent {
            if !contains(sent.get_service(), &recipient_key) {
                return Err(MessageError::ValidationError(vec![
                    "previously sent message ~service recipientKey does not match the recipient key"
                        .to_string(),
                ]));
            }
        }

        if let (Some(received), Some(sender_key)) = (previous_received, &self.sender_key) {
            if !contains(received.get_service(), sender_key) {
                return Err(MessageError::ValidationError(vec![
                    "previously received message ~service recipientKey does not match the sender key"
                        .to_string(),
                ]));
            }
        }

        Ok(())
    }
}

/// `OutboundMessage` is a message with its return path resolved
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Connection {
        payload: AgentMessage,
        connection: ConnectionRecord,
    },
    Service {
        payload: AgentMessage,
        service: ServiceDecorator,
        sender_key: String,
    },
}

impl OutboundMessage {
    pub fn payload(&self) -> &AgentMessage {
        match self {
            OutboundMessage::Connection { payload, .. } => payload,
            OutboundMessage::Service { payload, .. } => payload,
        }
    }
}
