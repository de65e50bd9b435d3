use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{error, info, warn};

use crate::agent::{
    AgentConfig, AgentError, AutoAccept, InboundMessageContext, MessageHandler, OutboundMessage,
};
use crate::messaging::{AgentMessage, MessageType};
use crate::storage::StorageBuilder;

use super::messages::{
    ProofMessage, PRESENTATION, PRESENTATION_ACK, PROBLEM_REPORT, PROPOSE_PRESENTATION,
    REQUEST_PRESENTATION,
};
use super::record::ProofRecord;
use super::selection::proposal_matches_request;
use super::types::{AcceptProposalConfig, ProofAPI, ProofError};
use super::usecase::Usecase;

fn proposal_matches(record: &ProofRecord) -> Result<bool, ProofError> {
    let (proposal, request) = match (record.proposal()?, record.request()?) {
        (Some(proposal), Some(request)) => (proposal, request),
        _ => return Ok(false),
    };

    Ok(proposal_matches_request(
        &proposal.presentation_proposal,
        &request.indy_proof_request()?,
    ))
}

fn presentation_verified(record: &ProofRecord) -> Result<bool, ProofError> {
    Ok(record.is_verified == Some(true))
}

/// `ProofHandler` processes present-proof messages, responding on behalf of the user when
/// the auto accept policy allows it
#[derive(Clone)]
pub struct ProofHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    proofs: Usecase<TStorage>,
    config: AgentConfig,
}

impl<TStorage> ProofHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(proofs: Usecase<TStorage>, config: AgentConfig) -> Self {
        Self { proofs, config }
    }

    fn should_accept(
        &self,
        record: &ProofRecord,
        content_approved: impl Fn(&ProofRecord) -> Result<bool, ProofError>,
    ) -> Result<bool, ProofError> {
        let policy = record.auto_accept_proof.unwrap_or(self.config.auto_accept_proofs);
        match policy {
            AutoAccept::Always => Ok(true),
            AutoAccept::Never => Ok(false),
            AutoAccept::ContentApproved => content_approved(record),
        }
    }

    async fn reply(
        &self,
        record: &ProofRecord,
        payload: AgentMessage,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match self.proofs.outbound(record, payload).await {
            Ok(outbound) => Ok(Some(outbound)),
            Err(err) => {
                error!(
                    "proof {}: no return path for auto accepted response: {}",
                    record.id, err
                );
                Ok(None)
            }
        }
    }

    async fn present(&self, record: ProofRecord) -> Result<Option<OutboundMessage>, AgentError> {
        let proof_request = record.proof_request()?;
        let proposal = record
            .proposal()
            .map_err(ProofError::from)?
            .map(|proposal| proposal.presentation_proposal);

        let retrieved = self
            .proofs
            .get_requested_credentials_for_proof_request(&proof_request, proposal, true)
            .await?;

        let requested = match self.proofs.auto_select_credentials_for_proof_request(retrieved) {
            Ok(requested) => requested,
            Err(ProofError::NoCredentialsAvailable(reason)) => {
                warn!("proof {}: request left unanswered: {}", record.id, reason);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let (record, payload) = self
            .proofs
            .create_presentation(record.id, requested, None)
            .await?;
        self.reply(&record, payload).await
    }
}

#[async_trait]
impl<TStorage> MessageHandler for ProofHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        [
            PROPOSE_PRESENTATION,
            REQUEST_PRESENTATION,
            PRESENTATION,
            PRESENTATION_ACK,
            PROBLEM_REPORT,
        ]
        .iter()
        .filter_map(|uri| MessageType::parse(uri).ok())
        .collect()
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match ProofMessage::decode(&ctx.message)? {
            ProofMessage::Proposal(_) => {
                let record = self.proofs.process_proposal(ctx).await?;
                if !self.should_accept(&record, proposal_matches)? {
                    return Ok(None);
                }

                let (record, payload) = self
                    .proofs
                    .create_request_for_proposal(record.id, AcceptProposalConfig::default())
                    .await?;
                self.reply(&record, payload).await
            }
            ProofMessage::Request(_) => {
                let record = self.proofs.process_request(ctx).await?;
                if !self.should_accept(&record, proposal_matches)? {
                    return Ok(None);
                }

                self.present(record).await
            }
            ProofMessage::Presentation(_) => {
                let record = self.proofs.process_presentation(ctx).await?;
                info!(
                    "proof {}: presentation verified: {:?}",
                    record.id, record.is_verified
                );

                if !self.should_accept(&record, presentation_verified)? {
                    return Ok(None);
                }

                let (record, payload) = self.proofs.create_ack(record.id).await?;
                self.reply(&record, payload).await
            }
            ProofMessage::Ack(_) => {
                let record = self.proofs.process_ack(ctx).await?;
                info!("proof {}: presentation acknowledged", record.id);
                Ok(None)
            }
            ProofMessage::ProblemReport(_) => {
                let record = self.proofs.process_problem_report(ctx).await?;
                info!(
                    "proof {}: abandoned: {:?}",
                    record.id, record.error_message
                );
                Ok(None)
            }
        }
    }
}
