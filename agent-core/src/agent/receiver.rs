use std::sync::Arc;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::{debug, warn};

use rstdev_domain::entity::ToJSON;

use crate::connections::{ConnectionAPI, ConnectionUsecase};
use crate::events::{AgentEvent, EventBus};
use crate::messaging::{AgentMessage, MessageError};
use crate::storage::StorageBuilder;
use crate::transport::TransportSession;
use crate::wallet::{DecryptedMessage, EncryptedMessage, Wallet};

use super::context::{InboundMessageContext, OutboundMessage};
use super::dispatcher::Dispatcher;
use super::sender::{EnvelopeKeys, MessageSender};
use super::threads::ThreadLocks;
use super::types::AgentError;

/// `MessageReceiver` is the inbound pipeline: decrypt, resolve the connection, dispatch
/// and deliver the handler answer
///
/// Handlers for messages sharing a thread id run one after another
#[derive(Clone)]
pub struct MessageReceiver<TStorage>
where
    TStorage: StorageBuilder,
{
    wallet: Arc<dyn Wallet>,
    connections: ConnectionUsecase<TStorage>,
    dispatcher: Arc<Dispatcher>,
    sender: MessageSender,
    events: EventBus,
    threads: ThreadLocks,
}

impl<TStorage> MessageReceiver<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(
        wallet: Arc<dyn Wallet>,
        connections: ConnectionUsecase<TStorage>,
        dispatcher: Arc<Dispatcher>,
        sender: MessageSender,
        events: EventBus,
    ) -> Self {
        Self {
            wallet,
            connections,
            dispatcher,
            sender,
            events,
            threads: ThreadLocks::new(),
        }
    }

    /// `receive_message` accepts an encrypted envelope or a plaintext message
    ///
    /// Messages that can not be decrypted or parsed are dropped. A failing handler still
    /// reports a problem to the sender when a return path exists.
    pub async fn receive_message(
        &self,
        raw: Value,
        session: Option<Arc<dyn TransportSession>>,
    ) -> Result<(), AgentError> {
        let decrypted = self.decrypt(raw).await.map_err(|err| {
            warn!("receiver: dropping inbound message: {}", err);
            err
        })?;

        let message = AgentMessage::from_value(decrypted.plaintext).map_err(|err| {
            warn!("receiver: dropping malformed message: {}", err);
            AgentError::from(err)
        })?;

        let connection = match &decrypted.recipient_key {
            Some(key) => self.connections.find_by_verkey(key.to_owned()).await?,
            None => None,
        };

        if let (Some(session), Some(connection)) = (&session, &connection) {
            if message.has_return_route() {
                self.sender
                    .sessions()
                    .register(connection.id.to_owned(), session.clone())
                    .await;

                if let Err(err) = self.sender.flush_queue(&connection.id, session.clone()).await {
                    warn!("receiver: unable to flush queue of {}: {}", connection.id, err);
                }
            }
        }

        debug!(
            "receiver: received {} on connection {:?}",
            message.get_type(),
            connection.as_ref().map(|conn| conn.id.to_owned())
        );

        let ctx = InboundMessageContext::new(message.clone())
            .with_connection(connection)
            .with_keys(decrypted.sender_key, decrypted.recipient_key)
            .with_session(session);

        // handlers of one thread run one at a time, the answer goes out after the lock is released
        let dispatched = {
            let _thread = self.threads.acquire(ctx.message.thread_id()).await;
            self.dispatcher.dispatch(&ctx).await
        };

        match dispatched {
            Ok(Some(outbound)) => self.send_outbound(&ctx, outbound).await?,
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "receiver: error processing {}: {}",
                    ctx.message.get_type(),
                    err
                );
                debug!(
                    "receiver: failed message {}",
                    ctx.message.to_json().unwrap_or_default()
                );
                self.report_problem(&ctx, &err).await;
                return Err(err);
            }
        }

        self.events.publish(AgentEvent::AgentMessageProcessed {
            message,
            connection_id: ctx.connection_id(),
        });

        Ok(())
    }

    async fn decrypt(&self, raw: Value) -> Result<DecryptedMessage, AgentError> {
        if raw.get("protected").is_none() {
            return Ok(DecryptedMessage {
                plaintext: raw,
                sender_key: None,
                recipient_key: None,
            });
        }

        let encrypted: EncryptedMessage = serde_json::from_value(raw)
            .map_err(|err| MessageError::JSONError(err.to_string()))?;

        Ok(self.wallet.decrypt(encrypted).await?)
    }

    /// `send_outbound` answers on the inbound session when the sender asked for a return
    /// route, otherwise through the regular sender
    async fn send_outbound(
        &self,
        ctx: &InboundMessageContext,
        outbound: OutboundMessage,
    ) -> Result<(), AgentError> {
        if let (true, Some(session)) = (ctx.message.has_return_route(), &ctx.session) {
            let (keys, connection_id) = match &outbound {
                OutboundMessage::Connection { connection, .. } => (
                    EnvelopeKeys {
                        recipient_keys: connection
                            .their_services()
                            .first()
                            .map(|service| service.recipient_keys.clone())
                            .unwrap_or_default(),
                        routing_keys: Vec::new(),
                        sender_key: Some(connection.verkey.to_owned()),
                    },
                    Some(connection.id.to_owned()),
                ),
                OutboundMessage::Service {
                    service,
                    sender_key,
                    ..
                } => (
                    EnvelopeKeys {
                        recipient_keys: service.recipient_keys.clone(),
                        routing_keys: Vec::new(),
                        sender_key: Some(sender_key.to_owned()),
                    },
                    None,
                ),
            };

            if !keys.recipient_keys.is_empty() {
                match self
                    .sender
                    .send_to_session(session.clone(), outbound.payload(), &keys)
                    .await
                {
                    Ok(_) => {
                        if let Some(id) = connection_id {
                            self.sender.sessions().register(id, session.clone()).await;
                        }

                        return Ok(());
                    }
                    Err(err) => warn!("receiver: return route failed: {}", err),
                }
            }
        }

        self.sender.send(outbound).await.map_err(AgentError::from)
    }

    async fn report_problem(&self, ctx: &InboundMessageContext, err: &AgentError) {
        let answering_report = ctx
            .message
            .message_type()
            .map(|message_type| message_type.message_name().replace('_', "-") == "problem-report")
            .unwrap_or(false);

        if answering_report {
            debug!("receiver: problem report {} is not answered", ctx.message.get_id());
            return;
        }

        let (message_type, report) = match err.problem_report() {
            Some(report) => report,
            None => return,
        };

        let payload = match AgentMessage::from_body(&message_type, &report) {
            Ok(payload) => payload.with_thread_id(&ctx.message.thread_id()),
            Err(err) => {
                warn!("receiver: unable to build problem report: {}", err);
                return;
            }
        };

        let outbound = match (&ctx.connection, ctx.message.get_service(), &ctx.recipient_key) {
            (Some(connection), _, _) => OutboundMessage::Connection {
                payload,
                connection: connection.clone(),
            },
            (None, Some(service), Some(recipient_key)) => OutboundMessage::Service {
                payload,
                service,
                sender_key: recipient_key.to_owned(),
            },
            _ => {
                warn!(
                    "receiver: no return path to report {} for {}",
                    report.error_message(),
                    ctx.message.get_type()
                );
                return;
            }
        };

        if let Err(err) = self.send_outbound(ctx, outbound).await {
            warn!("receiver: unable to send problem report: {}", err);
        }
    }
}
