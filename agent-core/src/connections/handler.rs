use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, info};

use crate::agent::{AgentConfig, AgentError, InboundMessageContext, MessageHandler, OutboundMessage};
use crate::messaging::{MessageType, NOTIFICATION_ACK};
use crate::routing::{MediationRecipientAPI, MediationRecipientUsecase};
use crate::storage::StorageBuilder;

use super::messages::{ConnectionMessage, PROBLEM_REPORT, REQUEST, RESPONSE, TRUST_PING, TRUST_PING_RESPONSE};
use super::types::ConnectionAPI;
use super::usecase::Usecase;

/// `ConnectionHandler` routes connection and trust ping messages to the connection usecase
///
/// With auto accept enabled the inviter answers a request with its response and the invitee
/// completes a response with a trust ping
#[derive(Clone)]
pub struct ConnectionHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    connections: Usecase<TStorage>,
    recipient: MediationRecipientUsecase<TStorage>,
    config: AgentConfig,
}

impl<TStorage> ConnectionHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(
        connections: Usecase<TStorage>,
        recipient: MediationRecipientUsecase<TStorage>,
        config: AgentConfig,
    ) -> Self {
        Self {
            connections,
            recipient,
            config,
        }
    }

    fn should_accept(&self, auto_accept: Option<bool>) -> bool {
        auto_accept.unwrap_or(self.config.auto_accept_connections)
    }
}

#[async_trait]
impl<TStorage> MessageHandler for ConnectionHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        [
            REQUEST,
            RESPONSE,
            PROBLEM_REPORT,
            TRUST_PING,
            TRUST_PING_RESPONSE,
            NOTIFICATION_ACK,
        ]
        .iter()
        .filter_map(|uri| MessageType::parse(uri).ok())
        .collect()
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match ConnectionMessage::decode(&ctx.message)? {
            ConnectionMessage::Request(_) => {
                let invitation_record = match &ctx.recipient_key {
                    Some(key) => self.connections.find_by_verkey(key.to_owned()).await?,
                    None => None,
                };

                let routing = match invitation_record {
                    Some(record) if record.multi_use_invitation => Some(
                        self.recipient
                            .get_routing(record.mediator_id.clone())
                            .await?,
                    ),
                    _ => None,
                };

                let record = self.connections.process_request(ctx, routing).await?;
                info!("connection {}: request received", record.id);

                if !self.should_accept(record.auto_accept) {
                    return Ok(None);
                }

                let (connection, payload) = self.connections.create_response(record.id).await?;
                Ok(Some(OutboundMessage::Connection {
                    payload,
                    connection,
                }))
            }
            ConnectionMessage::Response(_) => {
                let record = self.connections.process_response(ctx).await?;
                info!("connection {}: response received", record.id);

                if !self.should_accept(record.auto_accept) {
                    return Ok(None);
                }

                let (connection, payload) = self
                    .connections
                    .create_trust_ping(record.id, false)
                    .await?;

                Ok(Some(OutboundMessage::Connection {
                    payload,
                    connection,
                }))
            }
            ConnectionMessage::TrustPing(_) => {
                let (connection, response) = self.connections.process_ping(ctx).await?;
                Ok(response.map(|payload| OutboundMessage::Connection {
                    payload,
                    connection,
                }))
            }
            ConnectionMessage::TrustPingResponse(_) => {
                debug!(
                    "trust ping response received for thread {}",
                    ctx.message.thread_id()
                );
                Ok(None)
            }
            ConnectionMessage::Ack(_) => {
                let _ = self.connections.process_ack(ctx).await?;
                Ok(None)
            }
            ConnectionMessage::ProblemReport(_) => {
                let record = self.connections.process_problem_report(ctx).await?;
                info!(
                    "connection {}: problem reported: {:?}",
                    record.id, record.error_message
                );
                Ok(None)
            }
        }
    }
}
