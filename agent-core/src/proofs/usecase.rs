use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::Utc;
use rst_common::with_logging::log::{debug, warn};

use crate::agent::{InboundMessageContext, MessageSender, OutboundMessage};
use crate::connections::{ConnectionAPI, ConnectionRecord, ConnectionUsecase};
use crate::credentials::encoding::check_valid_encoding;
use crate::events::{AgentEvent, EventBus};
use crate::ledger::{
    CredentialDefinition, LedgerBuilder, RevocationRegistry, RevocationRegistryDefinition, Schema,
};
use crate::messaging::{AgentMessage, ProblemReport, ServiceDecorator};
use crate::routing::{MediationRecipientAPI, MediationRecipientUsecase};
use crate::storage::{Query, Repository, StorageBuilder};
use crate::wallet::anoncreds::{
    CredentialInfo, IndyProof, ProofRequest, RequestedAttribute, RequestedCredentials,
    RequestedPredicate, RevocationInterval,
};
use crate::wallet::{CredentialWallet, Wallet};

use super::messages::{Presentation, PresentationAck, ProposePresentation, RequestPresentation};
use super::preview::PresentationPreview;
use super::record::ProofRecord;
use super::selection::{auto_select, matches_proposal, proof_request_from_proposal, RetrievedCredentials};
use super::types::{
    AcceptProposalConfig, ProofAPI, ProofError, ProofState, ProposeProofConfig,
    RequestProofConfig,
};

const PRESENTATION_ABANDONED: &str = "abandoned";
const DEFAULT_PROOF_REQUEST_NAME: &str = "proof-request";
const DEFAULT_PROOF_REQUEST_VERSION: &str = "1.0";

type LedgerObjects = (
    BTreeMap<String, Schema>,
    BTreeMap<String, CredentialDefinition>,
);

/// revocation state of one candidate, both unknown when the credential is not revocable
struct RevocationStatus {
    revoked: Option<bool>,
    timestamp: Option<u64>,
}

#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, ProofRecord>,
    connections: ConnectionUsecase<TStorage>,
    recipient: MediationRecipientUsecase<TStorage>,
    wallet: Arc<dyn Wallet>,
    credential_wallet: Arc<dyn CredentialWallet>,
    ledger: Arc<dyn LedgerBuilder>,
    sender: MessageSender,
    events: EventBus,
}

impl<TStorage> Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: TStorage,
        connections: ConnectionUsecase<TStorage>,
        recipient: MediationRecipientUsecase<TStorage>,
        wallet: Arc<dyn Wallet>,
        credential_wallet: Arc<dyn CredentialWallet>,
        ledger: Arc<dyn LedgerBuilder>,
        sender: MessageSender,
        events: EventBus,
    ) -> Self {
        Self {
            repo: Repository::new(storage),
            connections,
            recipient,
            wallet,
            credential_wallet,
            ledger,
            sender,
            events,
        }
    }

    fn emit(&self, record: &ProofRecord, previous_state: Option<ProofState>) {
        debug!(
            "proof {}: {:?} -> {}",
            record.id, previous_state, record.state
        );

        self.events.publish(AgentEvent::ProofStateChanged {
            record: record.clone(),
            previous_state,
        });
    }

    async fn save(&self, record: &ProofRecord) -> Result<ProofRecord, ProofError> {
        let saved = self.repo.save(record).await?;
        self.emit(&saved, None);
        Ok(saved)
    }

    async fn update_state(
        &self,
        mut record: ProofRecord,
        state: ProofState,
    ) -> Result<ProofRecord, ProofError> {
        let previous_state = record.state;
        record.state = state;

        let updated = self.repo.update(&record).await?;
        self.emit(&updated, Some(previous_state));
        Ok(updated)
    }

    /// `abandon` moves the record to `abandoned` with the failure before the error is
    /// returned
    async fn abandon(&self, mut record: ProofRecord, description: String) -> ProofError {
        record.error_message = Some(format!("{}: {}", PRESENTATION_ABANDONED, description));
        if let Err(err) = self.update_state(record, ProofState::Abandoned).await {
            warn!("proof: unable to store abandoned state: {}", err);
        }

        ProofError::PresentationProblemReport {
            code: PRESENTATION_ABANDONED.to_string(),
            description,
        }
    }

    async fn ready_connection(&self, connection_id: String) -> Result<ConnectionRecord, ProofError> {
        let connection = self.connections.get_by_id(connection_id).await?;
        if !connection.is_ready() {
            return Err(ProofError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            )));
        }

        Ok(connection)
    }

    fn thread_query(ctx: &InboundMessageContext) -> Query {
        Query::new()
            .with("threadId", ctx.message.thread_id())
            .with_opt("connectionId", ctx.connection_id())
    }

    async fn our_service(&self) -> Result<ServiceDecorator, ProofError> {
        let routing = self.recipient.get_routing(None).await?;
        Ok(ServiceDecorator {
            recipient_keys: vec![routing.verkey],
            routing_keys: routing.routing_keys,
            service_endpoint: routing.endpoint,
        })
    }

    async fn build_request(&self, config: RequestProofConfig) -> Result<ProofRequest, ProofError> {
        if config.requested_attributes.is_empty() && config.requested_predicates.is_empty() {
            return Err(ProofError::ValidationError(
                "requested_attributes was missing".to_string(),
            ));
        }

        let nonce = match config.nonce {
            Some(nonce) => nonce,
            None => self.wallet.generate_nonce().await?,
        };

        Ok(ProofRequest {
            name: config
                .name
                .unwrap_or_else(|| DEFAULT_PROOF_REQUEST_NAME.to_string()),
            version: config
                .version
                .unwrap_or_else(|| DEFAULT_PROOF_REQUEST_VERSION.to_string()),
            nonce,
            requested_attributes: config.requested_attributes,
            requested_predicates: config.requested_predicates,
            non_revoked: config.non_revoked,
        })
    }

    /// `revocation_status` reads the registry at the requested non-revocation time
    async fn revocation_status(
        &self,
        non_revoked: Option<&RevocationInterval>,
        credential: &CredentialInfo,
    ) -> Result<RevocationStatus, ProofError> {
        let unknown = RevocationStatus {
            revoked: None,
            timestamp: None,
        };

        let interval = match non_revoked {
            Some(interval) => interval,
            None => return Ok(unknown),
        };

        let (rev_reg_id, cred_rev_id) = match (&credential.rev_reg_id, &credential.cred_rev_id) {
            (Some(rev_reg_id), Some(cred_rev_id)) => (rev_reg_id, cred_rev_id),
            _ => {
                debug!(
                    "proof: credential {} is not revocable, non-revocation is not checked",
                    credential.referent
                );
                return Ok(unknown);
            }
        };

        let timestamp = interval
            .to
            .or(interval.from)
            .unwrap_or_else(|| Utc::now().timestamp() as u64);

        let registry = self
            .ledger
            .get_revocation_registry(rev_reg_id.to_owned(), timestamp)
            .await?;

        Ok(RevocationStatus {
            revoked: Some(registry.is_revoked(cred_rev_id)),
            timestamp: Some(registry.timestamp),
        })
    }

    /// `fetch_ledger_objects` loads each referenced schema and credential definition once
    async fn fetch_ledger_objects(
        &self,
        schema_ids: BTreeSet<String>,
        cred_def_ids: BTreeSet<String>,
    ) -> Result<LedgerObjects, ProofError> {
        let mut schemas = BTreeMap::new();
        for id in schema_ids {
            let schema = self.ledger.get_schema(id.to_owned()).await?;
            schemas.insert(id, schema);
        }

        let mut cred_defs = BTreeMap::new();
        for id in cred_def_ids {
            let cred_def = self.ledger.get_credential_definition(id.to_owned()).await?;
            cred_defs.insert(id, cred_def);
        }

        Ok((schemas, cred_defs))
    }

    async fn verify(
        &self,
        proof_request: ProofRequest,
        proof: IndyProof,
    ) -> Result<bool, ProofError> {
        let schema_ids = proof
            .identifiers
            .iter()
            .map(|identifier| identifier.schema_id.to_owned())
            .collect();
        let cred_def_ids = proof
            .identifiers
            .iter()
            .map(|identifier| identifier.cred_def_id.to_owned())
            .collect();
        let (schemas, cred_defs) = self.fetch_ledger_objects(schema_ids, cred_def_ids).await?;

        let mut rev_reg_defs: BTreeMap<String, RevocationRegistryDefinition> = BTreeMap::new();
        let mut rev_regs: BTreeMap<String, BTreeMap<u64, RevocationRegistry>> = BTreeMap::new();
        for identifier in &proof.identifiers {
            let rev_reg_id = match &identifier.rev_reg_id {
                Some(id) => id.to_owned(),
                None => continue,
            };

            if !rev_reg_defs.contains_key(&rev_reg_id) {
                let definition = self
                    .ledger
                    .get_revocation_registry_definition(rev_reg_id.to_owned())
                    .await?;
                rev_reg_defs.insert(rev_reg_id.to_owned(), definition);
            }

            if let Some(timestamp) = identifier.timestamp {
                let registry = self
                    .ledger
                    .get_revocation_registry(rev_reg_id.to_owned(), timestamp)
                    .await?;
                rev_regs
                    .entry(rev_reg_id)
                    .or_default()
                    .insert(timestamp, registry);
            }
        }

        Ok(self
            .credential_wallet
            .verify_proof(proof_request, proof, schemas, cred_defs, rev_reg_defs, rev_regs)
            .await?)
    }

    async fn send(&self, record: &ProofRecord, payload: AgentMessage) -> Result<(), ProofError> {
        let outbound = self.outbound(record, payload).await?;
        self.sender.send(outbound).await?;
        Ok(())
    }
}

#[async_trait]
impl<TStorage> ProofAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn create_proposal(
        &self,
        connection_id: String,
        preview: PresentationPreview,
        config: ProposeProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let connection = self.ready_connection(connection_id).await?;

        let proposal = ProposePresentation {
            comment: config.comment,
            presentation_proposal: preview,
        };

        let message = AgentMessage::new(&proposal)?;
        let mut record = ProofRecord::new(
            Some(connection.id),
            message.get_id(),
            ProofState::ProposalSent,
        );
        record.proposal_message = Some(message.clone());
        record.auto_accept_proof = config.auto_accept_proof;

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn propose_proof(
        &self,
        connection_id: String,
        preview: PresentationPreview,
        config: ProposeProofConfig,
    ) -> Result<ProofRecord, ProofError> {
        let (record, message) = self.create_proposal(connection_id, preview, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn process_proposal(&self, ctx: &InboundMessageContext) -> Result<ProofRecord, ProofError> {
        let _: ProposePresentation = ctx.message.decode()?;
        let connection = ctx.assert_ready_connection()?;

        match self.repo.find_single_by_query(Self::thread_query(ctx)).await? {
            Some(mut record) => {
                record.assert_state(&[ProofState::RequestSent])?;
                ctx.assert_connection_or_service_decorator(
                    record.proposal_message.as_ref(),
                    record.request_message.as_ref(),
                )?;

                record.proposal_message = Some(ctx.message.clone());
                self.update_state(record, ProofState::ProposalReceived).await
            }
            None => {
                let mut record = ProofRecord::new(
                    Some(connection.id),
                    ctx.message.thread_id(),
                    ProofState::ProposalReceived,
                );
                record.proposal_message = Some(ctx.message.clone());
                self.save(&record).await
            }
        }
    }

    async fn create_request_for_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[ProofState::ProposalReceived])?;

        let proposal = record.proposal()?.ok_or_else(|| {
            ProofError::ValidationError(format!(
                "proof exchange {}: proposal_message was missing",
                record.id
            ))
        })?;

        let nonce = self.wallet.generate_nonce().await?;
        let proof_request = proof_request_from_proposal(
            &proposal.presentation_proposal,
            config
                .name
                .unwrap_or_else(|| DEFAULT_PROOF_REQUEST_NAME.to_string()),
            config
                .version
                .unwrap_or_else(|| DEFAULT_PROOF_REQUEST_VERSION.to_string()),
            nonce,
        );

        let message = AgentMessage::new(&RequestPresentation::new(&proof_request, config.comment)?)?
            .with_thread_id(&record.thread_id);
        record.request_message = Some(message.clone());
        if config.auto_accept_proof.is_some() {
            record.auto_accept_proof = config.auto_accept_proof;
        }

        let updated = self.update_state(record, ProofState::RequestSent).await?;
        Ok((updated, message))
    }

    async fn accept_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<ProofRecord, ProofError> {
        let (record, message) = self.create_request_for_proposal(record_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn create_request(
        &self,
        connection_id: String,
        config: RequestProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let connection = self.ready_connection(connection_id).await?;
        let comment = config.comment.clone();
        let auto_accept_proof = config.auto_accept_proof;
        let proof_request = self.build_request(config).await?;

        let message = AgentMessage::new(&RequestPresentation::new(&proof_request, comment)?)?;
        let mut record =
            ProofRecord::new(Some(connection.id), message.get_id(), ProofState::RequestSent);
        record.request_message = Some(message.clone());
        record.auto_accept_proof = auto_accept_proof;

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn request_proof(
        &self,
        connection_id: String,
        config: RequestProofConfig,
    ) -> Result<ProofRecord, ProofError> {
        let (record, message) = self.create_request(connection_id, config).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn create_out_of_band_request(
        &self,
        config: RequestProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let comment = config.comment.clone();
        let auto_accept_proof = config.auto_accept_proof;
        let proof_request = self.build_request(config).await?;
        let service = self.our_service().await?;

        let message = AgentMessage::new(&RequestPresentation::new(&proof_request, comment)?)?
            .with_service(service.clone());
        let mut record = ProofRecord::new(None, message.get_id(), ProofState::RequestSent);
        record.request_message = Some(message.clone());
        record.auto_accept_proof = auto_accept_proof;
        record.our_service = Some(service);

        let saved = self.save(&record).await?;
        Ok((saved, message))
    }

    async fn process_request(&self, ctx: &InboundMessageContext) -> Result<ProofRecord, ProofError> {
        let request: RequestPresentation = ctx.message.decode()?;
        request.indy_proof_request()?;

        let their_service = ctx.message.get_service();
        if ctx.connection.is_some() {
            ctx.assert_ready_connection()?;
        } else if their_service.is_none() {
            return Err(ProofError::ValidationError(
                "connection or ~service was missing for request".to_string(),
            ));
        }

        match self.repo.find_single_by_query(Self::thread_query(ctx)).await? {
            Some(mut record) => {
                record.assert_state(&[ProofState::ProposalSent])?;
                ctx.assert_connection_or_service_decorator(
                    record.request_message.as_ref(),
                    record.proposal_message.as_ref(),
                )?;

                record.request_message = Some(ctx.message.clone());
                self.update_state(record, ProofState::RequestReceived).await
            }
            None => {
                let mut record = ProofRecord::new(
                    ctx.connection_id(),
                    ctx.message.thread_id(),
                    ProofState::RequestReceived,
                );
                record.request_message = Some(ctx.message.clone());
                if ctx.connection.is_none() {
                    record.their_service = their_service;
                }

                self.save(&record).await
            }
        }
    }

    async fn get_requested_credentials_for_proof_request(
        &self,
        proof_request: &ProofRequest,
        presentation_proposal: Option<PresentationPreview>,
        filter_by_non_revocation_requirements: bool,
    ) -> Result<RetrievedCredentials, ProofError> {
        let mut retrieved = RetrievedCredentials::default();

        for (referent, requested) in &proof_request.requested_attributes {
            let credentials = self
                .credential_wallet
                .get_credentials_for_proof_request(proof_request.clone(), referent.to_owned())
                .await?;

            let names = requested.attribute_names();
            let credentials: Vec<CredentialInfo> = match &presentation_proposal {
                Some(proposal) if credentials.len() > 1 => credentials
                    .into_iter()
                    .filter(|credential| matches_proposal(credential, &names, proposal))
                    .collect(),
                _ => credentials,
            };

            let non_revoked = requested
                .non_revoked
                .as_ref()
                .or(proof_request.non_revoked.as_ref());

            let mut candidates = Vec::new();
            for credential in credentials {
                let status = self.revocation_status(non_revoked, &credential).await?;
                candidates.push(RequestedAttribute {
                    cred_id: credential.referent.to_owned(),
                    revealed: true,
                    timestamp: status.timestamp,
                    credential_info: Some(credential),
                    revoked: status.revoked,
                });
            }

            if filter_by_non_revocation_requirements {
                candidates.retain(|candidate| candidate.revoked != Some(true));
            }

            retrieved
                .requested_attributes
                .insert(referent.to_owned(), candidates);
        }

        for (referent, requested) in &proof_request.requested_predicates {
            let credentials = self
                .credential_wallet
                .get_credentials_for_proof_request(proof_request.clone(), referent.to_owned())
                .await?;

            let non_revoked = requested
                .non_revoked
                .as_ref()
                .or(proof_request.non_revoked.as_ref());

            let mut candidates = Vec::new();
            for credential in credentials {
                let status = self.revocation_status(non_revoked, &credential).await?;
                candidates.push(RequestedPredicate {
                    cred_id: credential.referent.to_owned(),
                    timestamp: status.timestamp,
                    credential_info: Some(credential),
                    revoked: status.revoked,
                });
            }

            if filter_by_non_revocation_requirements {
                candidates.retain(|candidate| candidate.revoked != Some(true));
            }

            retrieved
                .requested_predicates
                .insert(referent.to_owned(), candidates);
        }

        Ok(retrieved)
    }

    fn auto_select_credentials_for_proof_request(
        &self,
        retrieved: RetrievedCredentials,
    ) -> Result<RequestedCredentials, ProofError> {
        auto_select(retrieved)
    }

    async fn create_presentation(
        &self,
        record_id: String,
        requested_credentials: RequestedCredentials,
        comment: Option<String>,
    ) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let mut record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[ProofState::RequestReceived])?;

        let proof_request = record.proof_request()?;

        let mut schema_ids = BTreeSet::new();
        let mut cred_def_ids = BTreeSet::new();
        for credential_id in requested_credentials.credential_ids() {
            let info = self.credential_wallet.get_credential(credential_id).await?;
            schema_ids.insert(info.schema_id);
            cred_def_ids.insert(info.cred_def_id);
        }

        let (schemas, cred_defs) = self.fetch_ledger_objects(schema_ids, cred_def_ids).await?;
        let proof = self
            .credential_wallet
            .create_proof(proof_request, requested_credentials, schemas, cred_defs)
            .await?;

        let service = match record.connection_id {
            Some(_) => None,
            None => Some(self.our_service().await?),
        };

        let mut message = AgentMessage::new(&Presentation::new(&proof, comment)?)?
            .with_thread_id(&record.thread_id);
        message.set_service(service.clone());

        record.presentation_message = Some(message.clone());
        record.our_service = service;

        let updated = self
            .update_state(record, ProofState::PresentationSent)
            .await?;
        Ok((updated, message))
    }

    async fn accept_request(
        &self,
        record_id: String,
        requested_credentials: RequestedCredentials,
        comment: Option<String>,
    ) -> Result<ProofRecord, ProofError> {
        let (record, message) = self
            .create_presentation(record_id, requested_credentials, comment)
            .await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn decline_request(&self, record_id: String) -> Result<ProofRecord, ProofError> {
        let record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[ProofState::ProposalReceived, ProofState::RequestReceived])?;

        self.update_state(record, ProofState::Declined).await
    }

    async fn process_presentation(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofRecord, ProofError> {
        let presentation: Presentation = ctx.message.decode()?;
        let mut record = self
            .repo
            .get_single_by_query(Self::thread_query(ctx))
            .await?;
        record.assert_state(&[ProofState::RequestSent])?;

        ctx.assert_connection_or_service_decorator(
            record.proposal_message.as_ref(),
            record.request_message.as_ref(),
        )?;

        let proof = match presentation.indy_proof() {
            Ok(proof) => proof,
            Err(err) => return Err(self.abandon(record, err.to_string()).await),
        };

        for (raw, encoded) in proof.revealed_values() {
            if !check_valid_encoding(&raw, &encoded) {
                let description = format!(
                    "the encoded value {} does not match the raw value {}",
                    encoded, raw
                );
                return Err(self.abandon(record, description).await);
            }
        }

        let proof_request = record.proof_request()?;
        let is_verified = self.verify(proof_request, proof).await?;

        record.is_verified = Some(is_verified);
        record.presentation_message = Some(ctx.message.clone());
        if ctx.connection.is_none() {
            record.their_service = ctx.message.get_service();
        }

        self.update_state(record, ProofState::PresentationReceived)
            .await
    }

    async fn create_ack(&self, record_id: String) -> Result<(ProofRecord, AgentMessage), ProofError> {
        let record = self.repo.get_by_id(record_id).await?;
        record.assert_state(&[ProofState::PresentationReceived])?;

        let message =
            AgentMessage::new(&PresentationAck::ok())?.with_thread_id(&record.thread_id);
        let updated = self.update_state(record, ProofState::Done).await?;
        Ok((updated, message))
    }

    async fn accept_presentation(&self, record_id: String) -> Result<ProofRecord, ProofError> {
        let (record, message) = self.create_ack(record_id).await?;
        self.send(&record, message).await?;
        Ok(record)
    }

    async fn process_ack(&self, ctx: &InboundMessageContext) -> Result<ProofRecord, ProofError> {
        let _: PresentationAck = ctx.message.decode()?;
        let record = self
            .repo
            .get_single_by_query(Self::thread_query(ctx))
            .await?;
        record.assert_state(&[ProofState::PresentationSent])?;

        ctx.assert_connection_or_service_decorator(
            record.request_message.as_ref(),
            record.presentation_message.as_ref(),
        )?;

        self.update_state(record, ProofState::Done).await
    }

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofRecord, ProofError> {
        let report: ProblemReport = ctx.message.decode()?;
        let mut record = self
            .repo
            .get_single_by_query(Self::thread_query(ctx))
            .await?;

        record.error_message = Some(report.error_message());
        if record.state.is_terminal() {
            let updated = self.repo.update(&record).await?;
            return Ok(updated);
        }

        self.update_state(record, ProofState::Abandoned).await
    }

    async fn outbound(
        &self,
        record: &ProofRecord,
        payload: AgentMessage,
    ) -> Result<OutboundMessage, ProofError> {
        if let Some(connection_id) = &record.connection_id {
            let connection = self.connections.get_by_id(connection_id.to_owned()).await?;
            return Ok(OutboundMessage::Connection {
                payload,
                connection,
            });
        }

        let service = record.their_service.clone().ok_or_else(|| {
            ProofError::ValidationError(format!(
                "proof exchange {}: no connection or ~service to reply to",
                record.id
            ))
        })?;

        let sender_key = record
            .our_service
            .as_ref()
            .and_then(|service| service.recipient_keys.first().cloned())
            .ok_or_else(|| {
                ProofError::ValidationError(format!(
                    "proof exchange {}: our ~service was missing",
                    record.id
                ))
            })?;

        Ok(OutboundMessage::Service {
            payload,
            service,
            sender_key,
        })
    }

    async fn get_by_id(&self, id: String) -> Result<ProofRecord, ProofError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    async fn find_by_id(&self, id: String) -> Result<Option<ProofRecord>, ProofError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn get_all(&self) -> Result<Vec<ProofRecord>, ProofError> {
        Ok(self.repo.get_all().await?)
    }

    async fn delete_by_id(&self, id: String) -> Result<(), ProofError> {
        Ok(self.repo.delete_by_id(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::with_tokio::tokio;

    use crate::agent::AgentConfig;
    use crate::storage::{InMemoryStorage, Record};
    use crate::testing::{build_agent, FakeLedger};
    use crate::transport::MemoryHub;
    use crate::wallet::anoncreds::{AttributeInfo, RequestedProof, RevealedAttribute};

    use super::super::messages::PROBLEM_REPORT;

    async fn verifier() -> Usecase<InMemoryStorage> {
        let ledger = FakeLedger::with_faber_schema().await;
        let agent = build_agent(
            &MemoryHub::new(),
            &ledger,
            AgentConfig {
                label: "verifier".to_string(),
                ..Default::default()
            },
        )
        .await;

        agent.proofs()
    }

    fn request_config() -> RequestProofConfig {
        let mut requested_attributes = BTreeMap::new();
        requested_attributes.insert(
            "name".to_string(),
            AttributeInfo {
                name: Some("name".to_string()),
                names: None,
                restrictions: None,
                non_revoked: None,
            },
        );

        RequestProofConfig {
            requested_attributes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_request_without_attributes_rejected() {
        let proofs = verifier().await;
        let created = proofs
            .create_out_of_band_request(RequestProofConfig::default())
            .await;

        assert!(matches!(
            created.unwrap_err(),
            ProofError::ValidationError(_)
        ));
        assert!(proofs.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_band_request() {
        let proofs = verifier().await;
        let (record, message) = proofs
            .create_out_of_band_request(request_config())
            .await
            .unwrap();

        assert_eq!(record.state, ProofState::RequestSent);
        assert_eq!(record.thread_id, message.get_id());
        assert_eq!(record.our_service, message.get_service());

        let proof_request = record.proof_request().unwrap();
        assert_eq!(proof_request.name, DEFAULT_PROOF_REQUEST_NAME.to_string());
        assert!(!proof_request.nonce.is_empty());

        let declined = proofs.decline_request(record.id.to_owned()).await;
        assert!(matches!(
            declined.unwrap_err(),
            ProofError::InvalidState { actual: ProofState::RequestSent, .. }
        ));

        let unchanged = proofs.get_by_id(record.id.to_owned()).await.unwrap();
        assert_eq!(unchanged.state, ProofState::RequestSent);
        assert_eq!(unchanged.get_version(), record.get_version());
        assert!(unchanged.error_message.is_none());
    }

    #[tokio::test]
    async fn test_tampered_presentation_abandoned() {
        let proofs = verifier().await;
        let (record, _) = proofs
            .create_out_of_band_request(request_config())
            .await
            .unwrap();

        let mut requested_proof = RequestedProof::default();
        requested_proof.revealed_attrs.insert(
            "name".to_string(),
            RevealedAttribute {
                sub_proof_index: 0,
                raw: "Alice".to_string(),
                encoded: "12345".to_string(),
            },
        );

        let proof = IndyProof {
            proof: Default::default(),
            requested_proof,
            identifiers: Vec::new(),
        };

        let recipient_key = record
            .our_service
            .as_ref()
            .and_then(|service| service.recipient_keys.first().cloned());
        let message = AgentMessage::new(&Presentation::new(&proof, None).unwrap())
            .unwrap()
            .with_thread_id(&record.thread_id);
        let ctx = InboundMessageContext::new(message).with_keys(None, recipient_key);

        let processed = proofs.process_presentation(&ctx).await;
        assert!(matches!(
            processed.unwrap_err(),
            ProofError::PresentationProblemReport { code, .. } if code == PRESENTATION_ABANDONED
        ));

        let abandoned = proofs.get_by_id(record.id).await.unwrap();
        assert_eq!(abandoned.state, ProofState::Abandoned);
        assert!(abandoned
            .error_message
            .unwrap()
            .starts_with(PRESENTATION_ABANDONED));
    }

    #[tokio::test]
    async fn test_problem_report_abandons_exchange() {
        let proofs = verifier().await;
        let (record, _) = proofs
            .create_out_of_band_request(request_config())
            .await
            .unwrap();

        let message = AgentMessage::from_body(
            PROBLEM_REPORT,
            &ProblemReport::new("request-not-accepted", "declined by holder"),
        )
        .unwrap()
        .with_thread_id(&record.thread_id);

        let processed = proofs
            .process_problem_report(&InboundMessageContext::new(message))
            .await
            .unwrap();

        assert_eq!(processed.state, ProofState::Abandoned);
        assert_eq!(
            processed.error_message,
            Some("request-not-accepted: declined by holder".to_string())
        );
    }

    #[tokio::test]
    async fn test_problem_report_keeps_done_exchange() {
        let proofs = verifier().await;
        let (record, _) = proofs
            .create_out_of_band_request(request_config())
            .await
            .unwrap();

        let mut finished = proofs.get_by_id(record.id.to_owned()).await.unwrap();
        finished.state = ProofState::Done;
        let finished = proofs.repo.update(&finished).await.unwrap();

        let message = AgentMessage::from_body(
            PROBLEM_REPORT,
            &ProblemReport::new("late-report", "presentation rejected"),
        )
        .unwrap()
        .with_thread_id(&record.thread_id);

        let processed = proofs
            .process_problem_report(&InboundMessageContext::new(message))
            .await
            .unwrap();

        assert_eq!(processed.state, ProofState::Done);
        assert_eq!(
            processed.error_message,
            Some("late-report: presentation rejected".to_string())
        );
        assert_eq!(processed.get_version(), finished.get_version() + 1);
    }
}
