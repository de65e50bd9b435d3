use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, warn};

use crate::agent::{InboundMessageContext, MessageSender, OutboundMessage};
use crate::connections::{ConnectionAPI, ConnectionRecord, ConnectionUsecase};
use crate::events::{AgentEvent, EventBus};
use crate::ledger::LedgerBuilder;
use crate::messaging::{AgentMessage, MessageError, ProblemReport, ServiceDecorator};
use crate::routing::{MediationRecipientAPI, MediationRecipientUsecase};
use crate::storage::{Query, Repository, StorageBuilder};
use crate::wallet::CredentialWallet;

use super::encoding::{assert_values_match, check_attributes_match, convert_attributes_to_values};
use super::messages::{
    CredentialAck, IssueCredential, OfferCredential, ProposeCredential, RequestCredential,
};
use super::preview::CredentialPreview;
use super::record::CredentialExchangeRecord;
use super::types::{
    AcceptOfferConfig, AcceptProposalConfig, CredentialAPI, CredentialError, CredentialState,
    OfferCredentialConfig, ProposeCredentialConfig,
};

const ISSUANCE_ABANDONED: &str = "issuance-abandoned";

#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, CredentialExchangeRecord>,
    connections: ConnectionUsecase<TStorage>,
    recipient: MediationRecipientUsecase<TStorage>,
    credential_wallet: Arc<dyn CredentialWallet>,
    ledger: Arc<dyn LedgerBuilder>,
    sender: MessageSender,
    events: EventBus,
}

impl<TStorage> Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(
        storage: TStorage,
        connections: ConnectionUsecase<TStorage>,
        recipient: MediationRecipientUsecase<TStorage>,
        credential_wallet: Arc<dyn CredentialWallet>,
        ledger: Arc<dyn LedgerBuilder>,
        sender: MessageSender,
        events: EventBus,
    ) -> Self {
        Self {
            repo: Repository::new(storage),
            connections,
            recipient,
            credential_wallet,
            ledger,
            sender,
            events,
        }
    }

    fn emit(&self, record: &CredentialExchangeRecord, previous_state: Option<CredentialState>) {
        debug!(
            "credential {}: {:?} -> {}",
            record.id, previous_state, record.state
        );

        self.events.publish(AgentEvent::CredentialStateChanged {
            record: record.clone(),
            previous_state,
        });
    }

    async fn save(
        &self,
        record: &CredentialExchangeRecord,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let saved = self.repo.save(record).await?;
        self.emit(&saved, None);
        Ok(saved)
    }

    async fn update_state(
        &self,
        mut record: CredentialExchangeRecord,
        state: CredentialState,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let previous_state = record.state;
        record.state = state;

        let updated = self.repo.update(&record).await?;
        self.emit(&updated, Some(previous_state));
        Ok(updated)
    }

    /// `abandon` keeps the failure on the record before the error is returned
    async fn abandon(
        &self,
        mut record: CredentialExchangeRecord,
        description: String,
    ) -> CredentialError {
        record.error_message = Some(format!("{}: {}", ISSUANCE_ABANDONED, description));
        if let Err(err) = self.repo.update(&record).await {
            warn!("credential {}: unable to store error: {}", record.id, err);
        }

        CredentialError::ProblemReport {
            code: ISSUANCE_ABANDONED.to_string(),
            description,
        }
    }

    async fn ready_connection(
        &self,
        connection_id: String,
    ) -> Result<ConnectionRecord, CredentialError> {
        let connection = self.connections.get_by_id(connection_id).await?;
        if !connection.is_ready() {
            return Err(CredentialError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            )));
        }

        Ok(connection)
    }

    async fn find_by_thread(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<CredentialExchangeRecord>, CredentialError> {
        let query = Query::new()
            .with("threadId", ctx.message.thread_id())
            .with_opt("connectionId", ctx.connection_id());

        Ok(self.repo.find_single_by_query(query).await?)
    }

    async fn get_by_thread(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let query = Query::new()
            .with("threadId", ctx.message.thread_id())
            .with_opt("connectionId", ctx.connection_id());

        Ok(self.repo.get_single_by_query(query).await?)
    }

    /// `our_service` provisions a reply channel for a connection-less exchange
    async fn our_service(&self) -> Result<(String, ServiceDecorator), CredentialError> {
        let routing = self.recipient.get_routing(None).await?;
        let service = ServiceDecorator {
            recipient_keys: vec![routing.verkey],
            routing_keys: routing.routing_keys,
            service_endpoint: routing.endpoint,
        };

        Ok((routing.did, service))
    }

    async fn build_offer(
        &self,
        cred_def_id: String,
        preview: &CredentialPreview,
        comment: Option<String>,
    ) -> Result<OfferCredential, CredentialError> {
        let errors = preview.validate();
        if !errors.is_empty() {
            return Err(MessageError::ValidationError(errors).into());
        }

        let cred_def = self
            .ledger
            .get_credential_definition(cred_def_id.to_owned())
            .await?;
        let schema = self.ledger.get_schema(cred_def.schema_id.to_owned()).await?;
        check_attributes_match(&schema, preview)?;

        let offer = self
            .credential_wallet
            .create_credential_offer(cred_def_id)
            .await?;

        Ok(OfferCredential::new(preview.clone(), &offer, comment)?)
    }

    async fn send(
        &self,
        record: &CredentialExchangeRecord,
        payload: AgentMessage,
    ) -> Result<(), CredentialError> {
        let outbound = self.outbound(record, payload).await?;
        self.sender.send(outbound).await?;
        Ok(())
    }
}

#[async_trait]
impl<TStorage> CredentialAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn create_proposal(
        &self,
        connection_id: String,
        config: ProposeCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let connection = self.ready_connection(connection_id).await?;

        let proposal = ProposeCredential {
            comment: config.comment,
            credential_proposal: config.credential_proposal,
            schema_issuer_did: config.schema_issuer_did,
            schema_id: config.schema_id,
            schema_name: config.schema_name,
            schema_version: config.schema_version,
            cred_def_id: config.cred_def_id,
            issuer_did: config.issuer_did,
        };

        let message = AgentMessage::new(&proposal)?;
        let mut record = CredentialExchangeRecord::new(
            Some(connection.id),
            message.get_id(),
            CredentialState::ProposalSent,
        );
        record.proposal_message = Some(message.clone());
        record.auto_accept_credential = config.auto_accept_credential;
        record.credential_attributes = proposal
            .credential_proposal
            .map(|preview| preview.attributes)
            .unwrap_or_default();

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn propose_credential(
        &self,
        connection_id: String,
        config: ProposeCredentialConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_proposal(connection_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn process_proposal(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let proposal: ProposeCredential = ctx.message.decode()?;
        let connection = ctx.assert_ready_connection()?;
        let attributes = proposal
            .credential_proposal
            .map(|preview| preview.attributes)
            .unwrap_or_default();

        match self.find_by_thread(ctx).await? {
            Some(mut record) => {
                record.assert_state(&[CredentialState::OfferSent])?;
                record.proposal_message = Some(ctx.message.clone());
                record.credential_attributes = attributes;
                self.update_state(record, CredentialState::ProposalReceived)
                    .await
            }
            None => {
                let mut record = CredentialExchangeRecord::new(
                    Some(connection.id),
                    ctx.message.thread_id(),
                    CredentialState::ProposalReceived,
                );
                record.proposal_message = Some(ctx.message.clone());
                record.credential_attributes = attributes;
                self.save(&record).await
            }
        }
    }

    async fn create_offer_for_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[CredentialState::ProposalReceived])?;

        let proposal = record.proposal()?.unwrap_or_default();
        let cred_def_id = config
            .cred_def_id
            .or(proposal.cred_def_id)
            .ok_or_else(|| CredentialError::ValidationError("cred_def_id was missing".to_string()))?;

        let preview = config
            .preview
            .or(proposal.credential_proposal)
            .ok_or_else(|| {
                CredentialError::ValidationError("credential_proposal was missing".to_string())
            })?;

        let offer = self.build_offer(cred_def_id, &preview, config.comment).await?;
        let message = AgentMessage::new(&offer)?.with_thread_id(&record.thread_id);

        record.offer_message = Some(message.clone());
        record.credential_attributes = preview.attributes;
        if config.auto_accept_credential.is_some() {
            record.auto_accept_credential = config.auto_accept_credential;
        }

        let updated = self.update_state(record, CredentialState::OfferSent).await?;
        Ok((updated, message))
    }

    async fn accept_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_offer_for_proposal(record_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn negotiate_proposal(
        &self,
        record_id: String,
        preview: CredentialPreview,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let config = AcceptProposalConfig {
            preview: Some(preview),
            ..Default::default()
        };

        self.accept_proposal(record_id, config).await
    }

    async fn create_offer(
        &self,
        connection_id: String,
        config: OfferCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let connection = self.ready_connection(connection_id).await?;
        let offer = self
            .build_offer(config.cred_def_id, &config.preview, config.comment)
            .await?;

        let message = AgentMessage::new(&offer)?;
        let mut record = CredentialExchangeRecord::new(
            Some(connection.id),
            message.get_id(),
            CredentialState::OfferSent,
        );
        record.offer_message = Some(message.clone());
        record.credential_attributes = config.preview.attributes;
        record.auto_accept_credential = config.auto_accept_credential;

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn offer_credential(
        &self,
        connection_id: String,
        config: OfferCredentialConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_offer(connection_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn create_out_of_band_offer(
        &self,
        config: OfferCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let offer = self
            .build_offer(config.cred_def_id, &config.preview, config.comment)
            .await?;

        let (_, service) = self.our_service().await?;
        let message = AgentMessage::new(&offer)?.with_service(service.clone());

        let mut record =
            CredentialExchangeRecord::new(None, message.get_id(), CredentialState::OfferSent);
        record.offer_message = Some(message.clone());
        record.credential_attributes = config.preview.attributes;
        record.auto_accept_credential = config.auto_accept_credential;
        record.our_service = Some(service);

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn process_offer(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let offer: OfferCredential = ctx.message.decode()?;
        let their_service = ctx.message.get_service();
        if ctx.connection.is_some() {
            ctx.assert_ready_connection()?;
        } else if their_service.is_none() {
            return Err(CredentialError::ValidationError(
                "connection or ~service was missing for offer".to_string(),
            ));
        }

        match self.find_by_thread(ctx).await? {
            Some(mut record) => {
                record.assert_state(&[CredentialState::ProposalSent])?;
                record.offer_message = Some(ctx.message.clone());
                record.credential_attributes = offer.credential_preview.attributes;
                self.update_state(record, CredentialState::OfferReceived)
                    .await
            }
            None => {
                let mut record = CredentialExchangeRecord::new(
                    ctx.connection_id(),
                    ctx.message.thread_id(),
                    CredentialState::OfferReceived,
                );
                record.offer_message = Some(ctx.message.clone());
                record.credential_attributes = offer.credential_preview.attributes;
                if ctx.connection.is_none() {
                    record.their_service = their_service;
                }

                self.save(&record).await
            }
        }
    }

    async fn negotiate_offer(
        &self,
        record_id: String,
        preview: CredentialPreview,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[CredentialState::OfferReceived])?;
        if record.connection_id.is_none() {
            return Err(CredentialError::ValidationError(
                "connection was missing, connection-less offers can not be negotiated".to_string(),
            ));
        }

        let offer = record.get_offer()?.indy_offer()?;
        let proposal = ProposeCredential {
            credential_proposal: Some(preview.clone()),
            cred_def_id: Some(offer.cred_def_id),
            schema_id: Some(offer.schema_id),
            ..Default::default()
        };

        let message = AgentMessage::new(&proposal)?.with_thread_id(&record.thread_id);
        record.proposal_message = Some(message.clone());
        record.credential_attributes = preview.attributes;

        let updated = self
            .update_state(record, CredentialState::ProposalSent)
            .await?;
        self.send(&updated, message).await?;
        Ok(updated)
    }

    async fn create_request(
        &self,
        record_id: String,
        config: AcceptOfferConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[CredentialState::OfferReceived])?;

        let offer = record.get_offer()?.indy_offer()?;
        let cred_def = self
            .ledger
            .get_credential_definition(offer.cred_def_id.to_owned())
            .await?;

        let (prover_did, service) = match &record.connection_id {
            Some(connection_id) => {
                let connection = self.ready_connection(connection_id.to_owned()).await?;
                (connection.did, None)
            }
            None => {
                let (did, service) = self.our_service().await?;
                (did, Some(service))
            }
        };

        let (request, metadata) = self
            .credential_wallet
            .create_credential_request(prover_did, offer, cred_def)
            .await?;

        let mut message = AgentMessage::new(&RequestCredential::new(&request, config.comment)?)?
            .with_thread_id(&record.thread_id);
        message.set_service(service.clone());

        record.request_message = Some(message.clone());
        record.request_metadata = Some(metadata);
        record.our_service = service;
        if config.auto_accept_credential.is_some() {
            record.auto_accept_credential = config.auto_accept_credential;
        }

        let updated = self
            .update_state(record, CredentialState::RequestSent)
            .await?;
        Ok((updated, message))
    }

    async fn accept_offer(
        &self,
        record_id: String,
        config: AcceptOfferConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_request(record_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn decline_offer(
        &self,
        record_id: String,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[
            CredentialState::ProposalReceived,
            CredentialState::OfferReceived,
            CredentialState::RequestReceived,
            CredentialState::CredentialReceived,
        ])?;

        self.update_state(record, CredentialState::Declined).await
    }

    async fn process_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let _: RequestCredential = ctx.message.decode()?;
        let mut record = self.get_by_thread(ctx).await?;
        record.assert_state(&[CredentialState::OfferSent])?;

        ctx.assert_connection_or_service_decorator(
            record.proposal_message.as_ref(),
            record.offer_message.as_ref(),
        )?;

        record.request_message = Some(ctx.message.clone());
        if ctx.connection.is_none() {
            record.their_service = ctx.message.get_service();
        }

        self.update_state(record, CredentialState::RequestReceived)
            .await
    }

    async fn create_credential(
        &self,
        record_id: String,
        comment: Option<String>,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[CredentialState::RequestReceived])?;

        let offer = record.get_offer()?.indy_offer()?;
        let request: RequestCredential = record
            .request_message
            .as_ref()
            .ok_or_else(|| {
                CredentialError::ValidationError(format!(
                    "credential exchange {}: request_message was missing",
                    record.id
                ))
            })?
            .decode()?;

        let values = convert_attributes_to_values(&record.credential_attributes);
        let credential = self
            .credential_wallet
            .create_credential(offer, request.indy_request()?, values)
            .await?;

        let message = AgentMessage::new(&IssueCredential::new(&credential, comment)?)?
            .with_thread_id(&record.thread_id);
        record.credential_message = Some(message.clone());

        let updated = self
            .update_state(record, CredentialState::CredentialIssued)
            .await?;
        Ok((updated, message))
    }

    async fn accept_request(
        &self,
        record_id: String,
        comment: Option<String>,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_credential(record_id, comment).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn process_credential(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let issued: IssueCredential = ctx.message.decode()?;
        let mut record = self.get_by_thread(ctx).await?;
        record.assert_state(&[CredentialState::RequestSent])?;

        ctx.assert_connection_or_service_decorator(
            record.offer_message.as_ref(),
            record.request_message.as_ref(),
        )?;

        let credential = match issued.indy_credential() {
            Ok(credential) => credential,
            Err(err) => return Err(self.abandon(record, err.to_string()).await),
        };

        let offer = record.get_offer()?;
        let expected = convert_attributes_to_values(&offer.credential_preview.attributes);
        if let Err(err) = assert_values_match(&credential.values, &expected) {
            return Err(self.abandon(record, err.to_string()).await);
        }

        let metadata = record.request_metadata.clone().ok_or_else(|| {
            CredentialError::ValidationError(format!(
                "credential exchange {}: request_metadata was missing",
                record.id
            ))
        })?;

        let cred_def = self
            .ledger
            .get_credential_definition(credential.cred_def_id.to_owned())
            .await?;

        let rev_reg_def = match &credential.rev_reg_id {
            Some(id) => Some(
                self.ledger
                    .get_revocation_registry_definition(id.to_owned())
                    .await?,
            ),
            None => None,
        };

        let credential_id = self
            .credential_wallet
            .store_credential(None, metadata, credential, cred_def, rev_reg_def)
            .await?;

        record.credential_id = Some(credential_id);
        record.credential_message = Some(ctx.message.clone());
        self.update_state(record, CredentialState::CredentialReceived)
            .await
    }

    async fn create_ack(
        &self,
        record_id: String,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError> {
        let record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[CredentialState::CredentialReceived])?;

        let message = AgentMessage::new(&CredentialAck::ok())?.with_thread_id(&record.thread_id);
        let updated = self.update_state(record, CredentialState::Done).await?;
        Ok((updated, message))
    }

    async fn accept_credential(
        &self,
        record_id: String,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let (record, message) = self.create_ack(record_id).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let _: CredentialAck = ctx.message.decode()?;
        let record = self.get_by_thread(ctx).await?;
        record.assert_state(&[CredentialState::CredentialIssued])?;

        ctx.assert_connection_or_service_decorator(
            record.request_message.as_ref(),
            record.credential_message.as_ref(),
        )?;

        self.update_state(record, CredentialState::Done).await
    }

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError> {
        let report: ProblemReport = ctx.message.decode()?;
        let mut record = self.get_by_thread(ctx).await?;

        record.error_message = Some(report.error_message());
        let updated = self.repo.update(&record).await?;
        Ok(updated)
    }

    async fn outbound(
        &self,
        record: &CredentialExchangeRecord,
        payload: AgentMessage,
    ) -> Result<OutboundMessage, CredentialError> {
        if let Some(connection_id) = &record.connection_id {
            let connection = self.connections.get_by_id(connection_id.to_owned()).await?;
            return Ok(OutboundMessage::Connection {
                payload,
                connection,
            });
        }

        let service = record.their_service.clone().ok_or_else(|| {
            CredentialError::ValidationError(format!(
                "credential exchange {}: no connection or ~service to reply to",
                record.id
            ))
        })?;

        let sender_key = record
            .our_service
            .as_ref()
            .and_then(|service| service.recipient_keys.first().cloned())
            .ok_or_else(|| {
                CredentialError::ValidationError(format!(
                    "credential exchange {}: our ~service was missing",
                    record.id
                ))
            })?;

        Ok(OutboundMessage::Service {
            payload,
            service,
            sender_key,
        })
    }

    async fn get_by_id(&self, id: String) -> Result<CredentialExchangeRecord, CredentialError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    async fn find_by_id(
        &self,
        id: String,
    ) -> Result<Option<CredentialExchangeRecord>, CredentialError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn get_all(&self) -> Result<Vec<CredentialExchangeRecord>, CredentialError> {
        Ok(self.repo.get_all().await?)
    }

    async fn delete_by_id(&self, id: String, delete_credential: bool) -> Result<(), CredentialError> {
        let record = self.repo.get_by_id(id.to_owned()).await?;
        if delete_credential {
            if let Some(credential_id) = &record.credential_id {
                self.credential_wallet
                    .delete_credential(credential_id.to_owned())
                    .await?;
            }
        }

        Ok(self.repo.delete_by_id(id).await?)
    }
}
