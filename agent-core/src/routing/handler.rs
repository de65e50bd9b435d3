use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, info};

use crate::agent::{AgentConfig, AgentError, InboundMessageContext, MessageHandler, OutboundMessage};
use crate::messaging::{AgentMessage, MessageType};
use crate::storage::StorageBuilder;

use super::mediator::Usecase as MediatorUsecase;
use super::messages::{
    RoutingMessage, BATCH, BATCH_PICKUP, FORWARD, KEYLIST_UPDATE, KEYLIST_UPDATE_RESPONSE,
    MEDIATE_DENY, MEDIATE_GRANT, MEDIATE_REQUEST, PROBLEM_REPORT, STATUS, STATUS_REQUEST,
};
use super::recipient::Usecase as RecipientUsecase;
use super::types::{MediationRecipientAPI, MediatorAPI};

fn parse_types(uris: &[&str]) -> Vec<MessageType> {
    uris.iter()
        .filter_map(|uri| MessageType::parse(uri).ok())
        .collect()
}

fn reply(ctx: &InboundMessageContext, payload: AgentMessage) -> Result<Option<OutboundMessage>, AgentError> {
    let connection = ctx.assert_ready_connection()?;
    Ok(Some(OutboundMessage::Connection {
        payload,
        connection,
    }))
}

/// `MediatorHandler` serves the recipients of this agent when it acts as a mediator
#[derive(Clone)]
pub struct MediatorHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    mediator: MediatorUsecase<TStorage>,
    config: AgentConfig,
}

impl<TStorage> MediatorHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(mediator: MediatorUsecase<TStorage>, config: AgentConfig) -> Self {
        Self { mediator, config }
    }
}

#[async_trait]
impl<TStorage> MessageHandler for MediatorHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        parse_types(&[
            MEDIATE_REQUEST,
            KEYLIST_UPDATE,
            FORWARD,
            BATCH_PICKUP,
            STATUS_REQUEST,
        ])
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match RoutingMessage::decode(&ctx.message)? {
            RoutingMessage::MediationRequest(_) => {
                let record = self.mediator.process_mediation_request(ctx).await?;
                info!(
                    "mediation {}: requested by connection {}",
                    record.id, record.connection_id
                );

                if !self.config.auto_accept_mediation_requests {
                    return Ok(None);
                }

                let (_, payload) = self.mediator.create_grant(record.id).await?;
                reply(ctx, payload)
            }
            RoutingMessage::KeylistUpdate(_) => {
                let (_, payload) = self.mediator.process_keylist_update(ctx).await?;
                reply(ctx, payload)
            }
            RoutingMessage::Forward(_) => {
                self.mediator.process_forward(ctx).await?;
                Ok(None)
            }
            RoutingMessage::BatchPickup(_) => {
                let payload = self.mediator.process_batch_pickup(ctx).await?;
                reply(ctx, payload)
            }
            RoutingMessage::StatusRequest(_) => {
                let payload = self.mediator.process_status_request(ctx).await?;
                reply(ctx, payload)
            }
            _ => Err(AgentError::UnsupportedMessage(ctx.message.get_type())),
        }
    }
}

/// `MediationRecipientHandler` processes the mediator answers received by a recipient
#[derive(Clone)]
pub struct MediationRecipientHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    recipient: RecipientUsecase<TStorage>,
}

impl<TStorage> MediationRecipientHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(recipient: RecipientUsecase<TStorage>) -> Self {
        Self { recipient }
    }
}

#[async_trait]
impl<TStorage> MessageHandler for MediationRecipientHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        parse_types(&[
            MEDIATE_GRANT,
            MEDIATE_DENY,
            KEYLIST_UPDATE_RESPONSE,
            PROBLEM_REPORT,
            BATCH,
            STATUS,
        ])
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match RoutingMessage::decode(&ctx.message)? {
            RoutingMessage::MediationGrant(_) => {
                let _ = self.recipient.process_grant(ctx).await?;
            }
            RoutingMessage::MediationDeny(_) => {
                let _ = self.recipient.process_deny(ctx).await?;
            }
            RoutingMessage::KeylistUpdateResponse(_) => {
                let _ = self.recipient.process_keylist_update_response(ctx).await?;
            }
            RoutingMessage::ProblemReport(_) => {
                let _ = self.recipient.process_problem_report(ctx).await?;
            }
            RoutingMessage::Batch(_) => {
                let _ = self.recipient.process_batch(ctx).await?;
            }
            RoutingMessage::Status(status) => {
                debug!(
                    "mediation: {} messages waiting at the mediator",
                    status.message_count
                );
            }
            _ => return Err(AgentError::UnsupportedMessage(ctx.message.get_type())),
        }

        Ok(None)
    }
}
