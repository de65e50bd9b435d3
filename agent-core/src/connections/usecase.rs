use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json;
use rst_common::with_logging::log::debug;

use crate::agent::{AgentConfig, InboundMessageContext, MessageSender};
use crate::events::{AgentEvent, EventBus, EventType};
use crate::messaging::{AgentMessage, MessageError, ProblemReport};
use crate::routing::Routing;
use crate::storage::{Query, Repository, StorageBuilder};
use crate::wallet::Wallet;

use super::did_doc::DidDoc;
use super::messages::{
    ConnectionInvitation, ConnectionPayload, ConnectionRequest, ConnectionResponse, TrustPing,
    TrustPingResponse,
};
use super::record::ConnectionRecord;
use super::signature::{sign_data, unpack_and_verify};
use super::types::{
    ConnectionAPI, ConnectionError, ConnectionRole, ConnectionState, CreateInvitationConfig,
    ReceiveInvitationConfig,
};

#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, ConnectionRecord>,
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
        wallet: Arc<dyn Wallet>,
        sender: MessageSender,
        events: EventBus,
        config: AgentConfig,
    ) -> Self {
        Self {
            repo: Repository::new(storage),
            wallet,
            sender,
            events,
            config,
        }
    }

    fn build_record(role: ConnectionRole, routing: Routing) -> ConnectionRecord {
        let did_doc = DidDoc::build(
            &routing.did,
            &routing.verkey,
            &[routing.endpoint.to_owned()],
            &routing.routing_keys,
        );

        let mut record = ConnectionRecord::new(
            role,
            ConnectionState::Invited,
            routing.did,
            routing.verkey,
            did_doc,
        );
        record.mediator_id = routing.mediator_id;
        record
    }

    fn emit(&self, record: &ConnectionRecord, previous_state: Option<ConnectionState>) {
        debug!(
            "connection {}: {:?} -> {}",
            record.id, previous_state, record.state
        );

        self.events.publish(AgentEvent::ConnectionStateChanged {
            record: record.clone(),
            previous_state,
        });
    }

    async fn save(&self, record: &ConnectionRecord) -> Result<ConnectionRecord, ConnectionError> {
        let saved = self.repo.save(record).await?;
        self.emit(&saved, None);
        Ok(saved)
    }

    async fn update_state(
        &self,
        mut record: ConnectionRecord,
        state: ConnectionState,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let previous_state = record.state;
        record.state = state;

        let updated = self.repo.update(&record).await?;
        self.emit(&updated, Some(previous_state));
        Ok(updated)
    }
}

#[async_trait]
impl<TStorage> ConnectionAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn create_invitation(
        &self,
        config: CreateInvitationConfig,
    ) -> Result<(ConnectionRecord, ConnectionInvitation), ConnectionError> {
        let routing = config.routing;
        let mut invitation = ConnectionInvitation::new(
            config.label.unwrap_or_else(|| self.config.label.to_owned()),
            vec![routing.verkey.to_owned()],
            routing.endpoint.to_owned(),
            routing.routing_keys.clone(),
        );
        invitation.image_url = config.image_url;

        let mut record = Self::build_record(ConnectionRole::Inviter, routing);
        record.invitation = Some(invitation.clone());
        record.alias = config.alias;
        record.auto_accept = config.auto_accept;
        record.multi_use_invitation = config.multi_use;

        let saved = self.save(&record).await?;
        Ok((saved, invitation))
    }

    async fn receive_invitation(
        &self,
        invitation: ConnectionInvitation,
        config: ReceiveInvitationConfig,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let errors = invitation.validate();
        if !errors.is_empty() {
            return Err(MessageError::ValidationError(errors).into());
        }

        if let Some(key) = invitation.invitation_key() {
            let existing = self
                .repo
                .find_by_query(
                    Query::new()
                        .with("invitationKey", key)
                        .with("role", ConnectionRole::Invitee.to_string()),
                )
                .await?
                .into_iter()
                .find(|record| record.state != ConnectionState::Abandoned);

            if let Some(record) = existing {
                debug!("connection {}: invitation already received", record.id);
                return Ok(record);
            }
        }

        let mut record = Self::build_record(ConnectionRole::Invitee, config.routing);
        record.invitation = Some(invitation);
        record.alias = config.alias;
        record.auto_accept = config.auto_accept;

        let saved = self.save(&record).await?;
        if saved
            .auto_accept
            .unwrap_or(self.config.auto_accept_connections)
        {
            return self.accept_invitation(saved.id).await;
        }

        Ok(saved)
    }

    async fn receive_invitation_from_url(
        &self,
        url: String,
        config: ReceiveInvitationConfig,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let invitation = ConnectionInvitation::from_url(&url)?;
        self.receive_invitation(invitation, config).await
    }

    async fn create_request(
        &self,
        connection_id: String,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError> {
        let mut record = self.repo.get_by_id(connection_id).await?;
        record.assert_state(&[ConnectionState::Invited])?;
        record.assert_role(ConnectionRole::Invitee)?;

        let request = ConnectionRequest {
            label: self.config.label.to_owned(),
            connection: ConnectionPayload {
                did: record.did.to_owned(),
                did_doc: Some(record.did_doc.clone()),
            },
        };

        let message = AgentMessage::new(&request)?;
        record.thread_id = Some(message.get_id());

        let updated = self
            .update_state(record, ConnectionState::Requested)
            .await?;
        Ok((updated, message))
    }

    async fn accept_invitation(
        &self,
        connection_id: String,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let (record, message) = self.create_request(connection_id).await?;
        self.sender.send_message(message, &record).await?;
        Ok(record)
    }

    async fn process_request(
        &self,
        ctx: &InboundMessageContext,
        routing: Option<Routing>,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let recipient_key = ctx.recipient_key.clone().ok_or_else(|| {
            ConnectionError::ValidationError("recipient key was missing".to_string())
        })?;

        let request: ConnectionRequest = ctx.message.decode()?;
        let record = self
            .find_by_verkey(recipient_key.to_owned())
            .await?
            .ok_or_else(|| {
                ConnectionError::ValidationError(format!(
                    "no connection found for key {}",
                    recipient_key
                ))
            })?;

        record.assert_state(&[ConnectionState::Invited])?;
        record.assert_role(ConnectionRole::Inviter)?;

        let forked = record.multi_use_invitation;
        let mut record = if forked {
            let routing = routing.ok_or_else(|| {
                ConnectionError::ValidationError(
                    "routing was missing for multi use invitation".to_string(),
                )
            })?;

            let mut fork = Self::build_record(ConnectionRole::Inviter, routing);
            fork.invitation = record.invitation.clone();
            fork.alias = record.alias.clone();
            fork.auto_accept = record.auto_accept;
            fork
        } else {
            record
        };

        record.their_did = Some(request.connection.did);
        record.their_did_doc = request.connection.did_doc;
        record.their_label = Some(request.label);
        record.thread_id = Some(ctx.message.thread_id());

        if forked {
            record.state = ConnectionState::Requested;
            return self.save(&record).await;
        }

        self.update_state(record, ConnectionState::Requested).await
    }

    async fn create_response(
        &self,
        connection_id: String,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError> {
        let record = self.repo.get_by_id(connection_id).await?;
        record.assert_state(&[ConnectionState::Requested])?;
        record.assert_role(ConnectionRole::Inviter)?;

        let signer = record.invitation_key().ok_or_else(|| {
            ConnectionError::ValidationError("invitation key was missing".to_string())
        })?;

        let thread_id = record.thread_id.clone().ok_or_else(|| {
            ConnectionError::ValidationError("thread id was missing".to_string())
        })?;

        let payload = serde_json::to_value(ConnectionPayload {
            did: record.did.to_owned(),
            did_doc: Some(record.did_doc.clone()),
        })
        .map_err(|err| MessageError::JSONError(err.to_string()))?;

        let connection_sig = sign_data(self.wallet.clone(), &payload, &signer).await?;
        let message =
            AgentMessage::new(&ConnectionResponse { connection_sig })?.with_thread_id(&thread_id);

        let updated = self
            .update_state(record, ConnectionState::Responded)
            .await?;
        Ok((updated, message))
    }

    async fn accept_request(
        &self,
        connection_id: String,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let (record, message) = self.create_response(connection_id).await?;
        self.sender.send_message(message, &record).await?;
        Ok(record)
    }

    async fn process_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let response: ConnectionResponse = ctx.message.decode()?;
        let mut record = self
            .repo
            .get_single_by_query(
                Query::new()
                    .with("threadId", ctx.message.thread_id())
                    .with("role", ConnectionRole::Invitee.to_string()),
            )
            .await?;

        record.assert_state(&[ConnectionState::Requested])?;

        let signed = unpack_and_verify(self.wallet.clone(), &response.connection_sig).await?;
        if record.invitation_key().as_deref() != Some(response.connection_sig.signer.as_str()) {
            return Err(ConnectionError::ValidationError(format!(
                "connection in response is signed by {} and not by the invitation key",
                response.connection_sig.signer
            )));
        }

        let payload: ConnectionPayload = serde_json::from_value(signed)
            .map_err(|err| MessageError::JSONError(err.to_string()))?;

        let did_doc = payload.did_doc.ok_or_else(|| {
            ConnectionError::ValidationError("connection.DIDDoc was missing".to_string())
        })?;

        record.their_did = Some(payload.did);
        record.their_did_doc = Some(did_doc);
        self.update_state(record, ConnectionState::Responded).await
    }

    async fn create_trust_ping(
        &self,
        connection_id: String,
        response_requested: bool,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError> {
        let record = self.repo.get_by_id(connection_id).await?;
        record.assert_state(&[ConnectionState::Responded, ConnectionState::Completed])?;

        let message = AgentMessage::new(&TrustPing {
            comment: None,
            response_requested,
        })?;

        let record = match record.state {
            ConnectionState::Responded => {
                self.update_state(record, ConnectionState::Completed).await?
            }
            _ => record,
        };

        Ok((record, message))
    }

    async fn accept_response(
        &self,
        connection_id: String,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let (record, message) = self.create_trust_ping(connection_id, true).await?;
        self.sender.send_message(message, &record).await?;
        Ok(record)
    }

    async fn process_ping(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(ConnectionRecord, Option<AgentMessage>), ConnectionError> {
        let ping: TrustPing = ctx.message.decode()?;
        let record = ctx.connection.clone().ok_or_else(|| {
            ConnectionError::ValidationError("no connection associated with trust ping".to_string())
        })?;

        record.assert_state(&[ConnectionState::Responded, ConnectionState::Completed])?;
        let record = match record.state {
            ConnectionState::Responded => {
                self.update_state(record, ConnectionState::Completed).await?
            }
            _ => record,
        };

        if !ping.response_requested {
            return Ok((record, None));
        }

        let response = AgentMessage::new(&TrustPingResponse::default())?
            .with_thread_id(&ctx.message.thread_id());
        Ok((record, Some(response)))
    }

    async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let record = ctx.connection.clone().ok_or_else(|| {
            ConnectionError::ValidationError("no connection associated with ack".to_string())
        })?;

        match record.state {
            ConnectionState::Responded => {
                self.update_state(record, ConnectionState::Completed).await
            }
            _ => Ok(record),
        }
    }

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let report: ProblemReport = ctx.message.decode()?;
        let mut record = match &ctx.connection {
            Some(connection) => self.repo.get_by_id(connection.id.to_owned()).await?,
            None => {
                self.repo
                    .get_single_by_query(Query::new().with("threadId", ctx.message.thread_id()))
                    .await?
            }
        };

        record.error_message = Some(report.error_message());
        if record.state == ConnectionState::Completed {
            let updated = self.repo.update(&record).await?;
            return Ok(updated);
        }

        self.update_state(record, ConnectionState::Abandoned).await
    }

    async fn return_when_connected(
        &self,
        connection_id: String,
        timeout: Duration,
    ) -> Result<ConnectionRecord, ConnectionError> {
        let subscription = self.events.subscribe_to(EventType::ConnectionStateChanged);
        let record = self.repo.get_by_id(connection_id.to_owned()).await?;
        if record.state == ConnectionState::Completed {
            return Ok(record);
        }

        let event = subscription
            .wait_for(
                move |event| match event {
                    AgentEvent::ConnectionStateChanged { record, .. } => {
                        record.id == connection_id && record.state == ConnectionState::Completed
                    }
                    _ => false,
                },
                timeout,
            )
            .await?;

        match event {
            AgentEvent::ConnectionStateChanged { record, .. } => Ok(record),
            _ => Err(ConnectionError::ValidationError(
                "unexpected event".to_string(),
            )),
        }
    }

    async fn find_by_verkey(
        &self,
        verkey: String,
    ) -> Result<Option<ConnectionRecord>, ConnectionError> {
        let record = self
            .repo
            .find_single_by_query(Query::new().with("verkey", verkey))
            .await?;
        Ok(record)
    }

    async fn find_by_their_key(
        &self,
        verkey: String,
    ) -> Result<Option<ConnectionRecord>, ConnectionError> {
        let record = self
            .repo
            .find_single_by_query(Query::new().with("theirKey", verkey))
            .await?;
        Ok(record)
    }

    async fn find_by_invitation_key(
        &self,
        key: String,
    ) -> Result<Option<ConnectionRecord>, ConnectionError> {
        let records = self
            .repo
            .find_by_query(Query::new().with("invitationKey", key))
            .await?;
        Ok(records.into_iter().next())
    }

    async fn get_by_id(&self, id: String) -> Result<ConnectionRecord, ConnectionError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    async fn find_by_id(&self, id: String) -> Result<Option<ConnectionRecord>, ConnectionError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn get_all(&self) -> Result<Vec<ConnectionRecord>, ConnectionError> {
        Ok(self.repo.get_all().await?)
    }

    async fn delete_by_id(&self, id: String) -> Result<(), ConnectionError> {
        Ok(self.repo.delete_by_id(id).await?)
    }
}
