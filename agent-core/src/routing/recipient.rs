use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json;
use rst_common::with_logging::log::{debug, info, warn};

use crate::agent::{AgentConfig, InboundMessageContext, MessageSender};
use crate::connections::{
    ConnectionAPI, ConnectionInvitation, ConnectionRole, ConnectionState, ConnectionUsecase,
    ReceiveInvitationConfig,
};
use crate::events::{AgentEvent, EventBus, EventType};
use crate::messaging::{AgentMessage, MessageError, ProblemReport};
use crate::storage::{Query, Repository, StorageBuilder};
use crate::wallet::Wallet;

use super::messages::{
    Batch, KeylistUpdate, KeylistUpdateAction, KeylistUpdateItem, KeylistUpdateResponse,
    KeylistUpdateResult, KeylistUpdated, MediationDeny, MediationGrant, MediationRequest,
};
use super::record::MediationRecord;
use super::types::{MediationRecipientAPI, MediationRole, MediationState, Routing, RoutingError};

/// `Usecase` is the recipient side of mediation, it owns the default mediator selection and
/// provisions routing for new connections
#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, MediationRecord>,
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
            repo: Repository::new(storage),
            connections,
            wallet,
            sender,
            events,
            config,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.connection_timeout_ms)
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

    async fn find_by_thread(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError> {
        let record = self
            .repo
            .get_single_by_query(
                Query::new()
                    .with("threadId", ctx.message.thread_id())
                    .with("role", MediationRole::Recipient.to_string())
                    .with_opt("connectionId", ctx.connection_id()),
            )
            .await?;

        Ok(record)
    }

    /// `own_routing` is a fresh key reachable on this agent endpoint
    async fn own_routing(&self) -> Result<Routing, RoutingError> {
        let info = self.wallet.create_did(None).await?;
        Ok(Routing {
            endpoint: self.config.endpoint(),
            did: info.did,
            verkey: info.verkey,
            routing_keys: Vec::new(),
            mediator_id: None,
        })
    }

    async fn existing_mediation(
        &self,
        invitation: &ConnectionInvitation,
    ) -> Result<Option<MediationRecord>, RoutingError> {
        let key = match invitation.invitation_key() {
            Some(key) => key,
            None => return Ok(None),
        };

        let connection = match self.connections.find_by_invitation_key(key).await? {
            Some(connection)
                if connection.role == ConnectionRole::Invitee
                    && connection.state == ConnectionState::Completed =>
            {
                connection
            }
            _ => return Ok(None),
        };

        let mediation = self
            .find_by_connection_id(connection.id)
            .await?
            .filter(|record| record.is_ready());

        Ok(mediation)
    }
}

#[async_trait]
impl<TStorage> MediationRecipientAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn create_request(
        &self,
        connection_id: String,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError> {
        let connection = self.connections.get_by_id(connection_id).await?;
        if !connection.is_ready() {
            return Err(RoutingError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            )));
        }

        let message = AgentMessage::new(&MediationRequest::default())?;
        let record = MediationRecord::new(
            MediationRole::Recipient,
            MediationState::Requested,
            connection.id,
            message.get_id(),
        );

        let saved = self.repo.save(&record).await?;
        self.emit(&saved, None);
        Ok((saved, message))
    }

    async fn request_mediation(
        &self,
        connection_id: String,
    ) -> Result<MediationRecord, RoutingError> {
        let (record, message) = self.create_request(connection_id).await?;
        let connection = self
            .connections
            .get_by_id(record.connection_id.to_owned())
            .await?;

        self.sender.send_message(message, &connection).await?;
        Ok(record)
    }

    async fn process_grant(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let grant: MediationGrant = ctx.message.decode()?;

        let mut record = self.find_by_thread(ctx).await?;
        record.assert_state(&[MediationState::Requested])?;

        record.endpoint = Some(grant.endpoint);
        record.routing_keys = grant.routing_keys;

        let updated = self.update_state(record, MediationState::Granted).await?;
        info!(
            "mediation {}: granted by connection {}",
            updated.id, connection.id
        );

        if self.get_default_mediator().await?.is_none() {
            return self.set_default_mediator(updated.id).await;
        }

        Ok(updated)
    }

    async fn process_deny(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let _: MediationDeny = ctx.message.decode()?;

        let record = self.find_by_thread(ctx).await?;
        record.assert_state(&[MediationState::Requested])?;

        let updated = self.update_state(record, MediationState::Denied).await?;
        info!(
            "mediation {}: denied by connection {}",
            updated.id, connection.id
        );
        Ok(updated)
    }

    async fn keylist_update(
        &self,
        mediation_id: String,
        verkey: String,
        timeout: Duration,
    ) -> Result<MediationRecord, RoutingError> {
        let record = self.repo.get_by_id(mediation_id.to_owned()).await?;
        record.assert_role(MediationRole::Recipient)?;
        record.assert_state(&[MediationState::Granted])?;

        let connection = self
            .connections
            .get_by_id(record.connection_id.to_owned())
            .await?;

        let message = AgentMessage::new(&KeylistUpdate {
            updates: vec![KeylistUpdateItem {
                recipient_key: verkey.to_owned(),
                action: KeylistUpdateAction::Add,
            }],
        })?;

        let subscription = self.events.subscribe_to(EventType::MediationStateChanged);
        self.sender.send_message(message, &connection).await?;

        let event = subscription
            .wait_for(
                move |event| match event {
                    AgentEvent::MediationStateChanged { record, .. } => {
                        record.id == mediation_id && record.recipient_keys.contains(&verkey)
                    }
                    _ => false,
                },
                timeout,
            )
            .await?;

        match event {
            AgentEvent::MediationStateChanged { record, .. } => Ok(record),
            _ => Err(RoutingError::ValidationError("unexpected event".to_string())),
        }
    }

    async fn process_keylist_update_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(MediationRecord, Vec<KeylistUpdated>), RoutingError> {
        let connection = ctx.assert_ready_connection()?;
        let response: KeylistUpdateResponse = ctx.message.decode()?;

        let mut record = self
            .find_by_connection_id(connection.id.to_owned())
            .await?
            .ok_or_else(|| {
                RoutingError::ValidationError(format!(
                    "no mediation found for connection {}",
                    connection.id
                ))
            })?;

        for updated in &response.updated {
            match updated.result {
                KeylistUpdateResult::Success | KeylistUpdateResult::NoChange => {
                    match updated.action {
                        KeylistUpdateAction::Add => record.add_recipient_key(&updated.recipient_key),
                        KeylistUpdateAction::Remove => {
                            record.remove_recipient_key(&updated.recipient_key)
                        }
                    };
                }
                _ => warn!(
                    "mediation {}: keylist update of {} failed: {:?}",
                    record.id, updated.recipient_key, updated.result
                ),
            }
        }

        let updated = self.repo.update(&record).await?;
        self.emit(&updated, Some(updated.state));
        Ok((updated, response.updated))
    }

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError> {
        let report: ProblemReport = ctx.message.decode()?;
        let mut record = self.find_by_thread(ctx).await?;

        record.error_message = Some(report.error_message());
        let updated = self.repo.update(&record).await?;
        warn!(
            "mediation {}: problem reported: {}",
            updated.id,
            report.error_message()
        );
        Ok(updated)
    }

    async fn process_batch(&self, ctx: &InboundMessageContext) -> Result<usize, RoutingError> {
        let batch: Batch = ctx.message.decode()?;
        let total = batch.messages.len();

        for item in batch.messages {
            let payload = serde_json::to_value(item.message)
                .map_err(|err| MessageError::JSONError(err.to_string()))?;
            self.sender.push_inbound(payload)?;
        }

        debug!("mediation: {} picked up messages queued for processing", total);
        Ok(total)
    }

    async fn set_default_mediator(
        &self,
        mediation_id: String,
    ) -> Result<MediationRecord, RoutingError> {
        let mut record = self.repo.get_by_id(mediation_id).await?;
        record.assert_role(MediationRole::Recipient)?;

        let current_defaults = self
            .repo
            .find_by_query(Query::new().with("default", "true"))
            .await?;

        for mut current in current_defaults {
            if current.id == record.id {
                continue;
            }

            current.is_default = false;
            self.repo.update(&current).await?;
        }

        if record.is_default {
            return Ok(record);
        }

        record.is_default = true;
        let updated = self.repo.update(&record).await?;
        info!("mediation {}: set as default mediator", updated.id);
        Ok(updated)
    }

    async fn get_default_mediator(&self) -> Result<Option<MediationRecord>, RoutingError> {
        let records = self
            .repo
            .find_by_query(
                Query::new()
                    .with("default", "true")
                    .with("role", MediationRole::Recipient.to_string()),
            )
            .await?;

        Ok(records.into_iter().next())
    }

    async fn get_routing(&self, mediator_id: Option<String>) -> Result<Routing, RoutingError> {
        let mut routing = self.own_routing().await?;
        let mediator = match mediator_id {
            Some(id) => Some(self.repo.get_by_id(id).await?),
            None => self.get_default_mediator().await?,
        };

        let mediator = match mediator.filter(|record| record.is_ready()) {
            Some(mediator) => mediator,
            None => return Ok(routing),
        };

        self.keylist_update(
            mediator.id.to_owned(),
            routing.verkey.to_owned(),
            self.timeout(),
        )
        .await?;

        routing.endpoint = mediator.endpoint.unwrap_or(routing.endpoint);
        routing.routing_keys = mediator.routing_keys;
        routing.mediator_id = Some(mediator.id);
        Ok(routing)
    }

    async fn return_when_granted(
        &self,
        mediation_id: String,
        timeout: Duration,
    ) -> Result<MediationRecord, RoutingError> {
        let subscription = self.events.subscribe_to(EventType::MediationStateChanged);
        let record = self.repo.get_by_id(mediation_id.to_owned()).await?;
        if matches!(record.state, MediationState::Granted | MediationState::Denied) {
            return Ok(record);
        }

        let event = subscription
            .wait_for(
                move |event| match event {
                    AgentEvent::MediationStateChanged { record, .. } => {
                        record.id == mediation_id
                            && matches!(
                                record.state,
                                MediationState::Granted | MediationState::Denied
                            )
                    }
                    _ => false,
                },
                timeout,
            )
            .await?;

        match event {
            AgentEvent::MediationStateChanged { record, .. } => Ok(record),
            _ => Err(RoutingError::ValidationError("unexpected event".to_string())),
        }
    }

    async fn provision(&self, invitation_url: String) -> Result<MediationRecord, RoutingError> {
        let invitation = ConnectionInvitation::from_url(&invitation_url)?;
        if let Some(mediation) = self.existing_mediation(&invitation).await? {
            debug!("mediation {}: reusing provisioned mediator", mediation.id);
            return self.set_default_mediator(mediation.id).await;
        }

        let routing = self.own_routing().await?;
        let connection = self
            .connections
            .receive_invitation(
                invitation,
                ReceiveInvitationConfig {
                    alias: Some("mediator".to_string()),
                    auto_accept: Some(true),
                    routing,
                },
            )
            .await?;

        let connection = self
            .connections
            .return_when_connected(connection.id, self.timeout())
            .await?;

        let record = self.request_mediation(connection.id).await?;
        let record = self.return_when_granted(record.id, self.timeout()).await?;
        if record.state == MediationState::Denied {
            return Err(RoutingError::ValidationError(format!(
                "mediation {} was denied",
                record.id
            )));
        }

        self.set_default_mediator(record.id).await
    }

    async fn find_by_connection_id(
        &self,
        connection_id: String,
    ) -> Result<Option<MediationRecord>, RoutingError> {
        let record = self
            .repo
            .find_single_by_query(
                Query::new()
                    .with("connectionId", connection_id)
                    .with("role", MediationRole::Recipient.to_string()),
            )
            .await?;

        Ok(record)
    }

    async fn get_by_id(&self, id: String) -> Result<MediationRecord, RoutingError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    async fn get_all(&self) -> Result<Vec<MediationRecord>, RoutingError> {
        Ok(self.repo.get_all().await?)
    }
}
