use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, info, warn};

use crate::agent::{AgentConfig, InboundMessageContext, MessageSender};
use crate::connections::{ConnectionAPI, ConnectionUsecase};
use crate::events::{AgentEvent, EventBus};
use crate::messaging::AgentMessage;
use crate::storage::{Query, Repository, StorageBuilder, StorageError};
use crate::wallet::Wallet;

use super::messages::{
    Batch, BatchItem, BatchPickup, Forward, KeylistUpdate, KeylistUpdateAction,
    KeylistUpdateResponse, KeylistUpdateResult, KeylistUpdated, MediationDeny, MediationGrant,
    MediationRequest, Status, StatusRequest,
};
use super::record::{MediationRecord, MediatorRoutingRecord, MEDIATOR_ROUTING_RECORD_ID};
use super::types::{MediationRole, MediationState, MediatorAPI, RoutingError};

/// `Usecase` is the mediator side, it grants mediation, keeps each recipient keylist and
/// delivers forwarded envelopes
#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, MediationRecord>,
    routing_repo: Repository<TStorage, MediatorRoutingRecord>,
    connections: ConnectionUsecase<TStorage>,
    wallet: Arc<dyn Wallet>,
    sender: MessageSender,
    events: EventBus,
    config: AgentConfig,
}

impl<TStorage> Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(
        storage: TStorage,
        connections: ConnectionUsecase<TStorage>,
        wallet: Arc<dyn Wallet>,
        sender: MessageSender,
        events: EventBus,
        config: AgentConfig,
    ) -> Self {
        Self {
            repo: Repository::new(storage.clone()),
            routing_repo: Repository::new(storage),
            connections,
            wallet,
            sender,
            events,
            config,
        }
    }

    fn emit(&self, record: &MediationRecord, previous_state: Option<MediationState>) {
        debug!(
            "mediation {}: {:?} -> {}",
            record.id, previous_state, record.state
        );

        self.events.publish(AgentEvent::MediationStateChanged {
            record: record.clone(),
            previous_state,
        });
    }

    async fn update_state(
        &self,
        mut record: MediationRecord,
        state: MediationState,
    ) -> Result<MediationRecord, RoutingError> {
        let previous_state = record.state;
        record.state = state;

        let updated = self.repo.update(&record).await?;
        self.emit(&updated, Some(previous_state));
        Ok(updated)
    }

    async fn get_pending(&self, mediation_id: String) -> Result<MediationRecord, RoutingError> {
        let record = self.repo.get_by_id(mediation_id).await?;
        record.assert_role(MediationRole::Mediator)?;
        record.assert_state(&[MediationState::Requested])?;
        Ok(record)
    }
}

#[async_trait]
impl<TStorage> MediatorAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn process_mediation_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let _: MediationRequest = ctx.message.decode()?;

        let record = MediationRecord::new(
            MediationRole::Mediator,
            MediationState::Requested,
            connection.id,
            ctx.message.thread_id(),
        );

        let saved = self.repo.save(&record).await?;
        self.emit(&saved, None);
        Ok(saved)
    }

    async fn create_grant(
        &self,
        mediation_id: String,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError> {
        let mut record = self.get_pending(mediation_id).await?;
        let routing_keys = self.get_routing_keys().await?;
        let endpoint = self.config.endpoint();

        let message = AgentMessage::new(&MediationGrant {
            endpoint: endpoint.to_owned(),
            routing_keys: routing_keys.clone(),
        })?
        .with_thread_id(&record.thread_id);

        record.endpoint = Some(endpoint);
        record.routing_keys = routing_keys;

        let updated = self.update_state(record, MediationState::Granted).await?;
        info!(
            "mediation {}: granted to connection {}",
            updated.id, updated.connection_id
        );
        Ok((updated, message))
    }

    async fn grant_request(&self, mediation_id: String) -> Result<MediationRecord, RoutingError> {
        let (record, message) = self.create_grant(mediation_id).await?;
        let connection = self
            .connections
            .get_by_id(record.connection_id.to_owned())
            .await?;

        self.sender.send_message(message, &connection).await?;
        Ok(record)
    }

    async fn deny_request(&self, mediation_id: String) -> Result<MediationRecord, RoutingError> {
        let record = self.get_pending(mediation_id).await?;
        let message =
            AgentMessage::new(&MediationDeny::default())?.with_thread_id(&record.thread_id);

        let updated = self.update_state(record, MediationState::Denied).await?;
        let connection = self
            .connections
            .get_by_id(updated.connection_id.to_owned())
            .await?;

        self.sender.send_message(message, &connection).await?;
        Ok(updated)
    }

    async fn process_keylist_update(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let update: KeylistUpdate = ctx.message.decode()?;

        let mut record = self
            .repo
            .get_single_by_query(
                Query::new()
                    .with("connectionId", connection.id)
                    .with("role", MediationRole::Mediator.to_string()),
            )
            .await?;
        record.assert_state(&[MediationState::Granted])?;

        let updated: Vec<KeylistUpdated> = update
            .updates
            .into_iter()
            .map(|item| {
                let changed = match item.action {
                    KeylistUpdateAction::Add => record.add_recipient_key(&item.recipient_key),
                    KeylistUpdateAction::Remove => {
                        record.remove_recipient_key(&item.recipient_key)
                    }
                };

                KeylistUpdated {
                    recipient_key: item.recipient_key,
                    action: item.action,
                    result: if changed {
                        KeylistUpdateResult::Success
                    } else {
                        KeylistUpdateResult::NoChange
                    },
                }
            })
            .collect();

        let record = self.repo.update(&record).await?;
        self.emit(&record, Some(record.state));

        let message = AgentMessage::new(&KeylistUpdateResponse { updated })?
            .with_thread_id(&ctx.message.thread_id());
        Ok((record, message))
    }

    async fn process_forward(&self, ctx: &InboundMessageContext) -> Result<(), RoutingError> {
        let forward: Forward = ctx.message.decode()?;
        let record = self
            .repo
            .find_single_by_query(
                Query::new()
                    .with("recipientKeys", forward.to.to_owned())
                    .with("role", MediationRole::Mediator.to_string()),
            )
            .await?
            .ok_or_else(|| {
                warn!("mediator: no mediation registered for key {}", forward.to);
                RoutingError::UnknownRecipient(forward.to.to_owned())
            })?;

        let connection = self
            .connections
            .get_by_id(record.connection_id.to_owned())
            .await?;

        self.sender
            .forward_to_connection(forward.msg, &connection)
            .await?;

        debug!(
            "mediator: forward for {} delivered to connection {}",
            forward.to, connection.id
        );
        Ok(())
    }

    async fn process_batch_pickup(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let pickup: BatchPickup = ctx.message.decode()?;

        let messages = self
            .sender
            .queue()
            .take(connection.id.to_owned(), pickup.batch_size)
            .await?;

        debug!(
            "mediator: {} messages picked up by connection {}",
            messages.len(),
            connection.id
        );

        let batch = Batch {
            messages: messages.into_iter().map(BatchItem::new).collect(),
        };

        Ok(AgentMessage::new(&batch)?.with_thread_id(&ctx.message.thread_id()))
    }

    async fn process_status_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let _: StatusRequest = ctx.message.decode()?;

        let message_count = self.sender.queue().count(connection.id).await?;
        Ok(AgentMessage::new(&Status { message_count })?.with_thread_id(&ctx.message.thread_id()))
    }

    async fn get_routing_keys(&self) -> Result<Vec<String>, RoutingError> {
        let id = MEDIATOR_ROUTING_RECORD_ID.to_string();
        if let Some(record) = self.routing_repo.find_by_id(id.to_owned()).await? {
            return Ok(record.routing_keys);
        }

        let info = self.wallet.create_did(None).await?;
        let record = MediatorRoutingRecord::new(vec![info.verkey]);
        match self.routing_repo.save(&record).await {
            Ok(saved) => {
                info!("mediator: routing keys provisioned");
                Ok(saved.routing_keys)
            }
            Err(StorageError::RecordDuplicate(_)) => {
                let current = self.routing_repo.get_by_id(id).await?;
                Ok(current.routing_keys)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_by_id(&self, id: String) -> Result<MediationRecord, RoutingError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    async fn get_all(&self) -> Result<Vec<MediationRecord>, RoutingError> {
        Ok(self.repo.get_all().await?)
    }
}
