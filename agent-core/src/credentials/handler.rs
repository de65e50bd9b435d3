use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{error, info};

use crate::agent::{
    AgentConfig, AgentError, AutoAccept, InboundMessageContext, MessageHandler, OutboundMessage,
};
use crate::messaging::{AgentMessage, MessageType};
use crate::storage::StorageBuilder;

use super::messages::{
    CredentialMessage, RequestCredential, CREDENTIAL_ACK, ISSUE_CREDENTIAL, OFFER_CREDENTIAL,
    PROBLEM_REPORT, PROPOSE_CREDENTIAL, REQUEST_CREDENTIAL,
};
use super::record::CredentialExchangeRecord;
use super::types::{AcceptOfferConfig, AcceptProposalConfig, CredentialAPI, CredentialError};
use super::usecase::Usecase;

/// `proposal_matches_offer` holds when both sides agree on the preview values and on the
/// credential definition
fn proposal_matches_offer(record: &CredentialExchangeRecord) -> Result<bool, CredentialError> {
    let (proposal, offer) = match (record.proposal()?, record.offer()?) {
        (Some(proposal), Some(offer)) => (proposal, offer),
        _ => return Ok(false),
    };

    let same_values = proposal
        .credential_proposal
        .map(|preview| preview.same_values(&offer.credential_preview))
        .unwrap_or(false);

    let cred_def_id = offer.indy_offer()?.cred_def_id;
    let same_cred_def = proposal
        .cred_def_id
        .map(|id| id == cred_def_id)
        .unwrap_or(true);

    Ok(same_values && same_cred_def)
}

fn request_matches_offer(record: &CredentialExchangeRecord) -> Result<bool, CredentialError> {
    let offer = record.get_offer()?.indy_offer()?;
    let request: Option<RequestCredential> = record
        .request_message
        .as_ref()
        .map(|message| message.decode())
        .transpose()?;

    let request = match request {
        Some(request) => request.indy_request()?,
        None => return Ok(false),
    };

    if request.cred_def_id != offer.cred_def_id {
        return Ok(false);
    }

    if record.proposal_message.is_some() {
        return proposal_matches_offer(record);
    }

    Ok(true)
}

/// `CredentialHandler` processes issue-credential messages and answers them according
/// to the auto accept policy, the record setting wins over the agent config
#[derive(Clone)]
pub struct CredentialHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    credentials: Usecase<TStorage>,
    config: AgentConfig,
}

impl<TStorage> CredentialHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(credentials: Usecase<TStorage>, config: AgentConfig) -> Self {
        Self {
            credentials,
            config,
        }
    }

    fn policy(&self, record: &CredentialExchangeRecord) -> AutoAccept {
        record
            .auto_accept_credential
            .unwrap_or(self.config.auto_accept_credentials)
    }

    fn should_accept(
        &self,
        record: &CredentialExchangeRecord,
        content_approved: impl Fn(&CredentialExchangeRecord) -> Result<bool, CredentialError>,
    ) -> Result<bool, CredentialError> {
        match self.policy(record) {
            AutoAccept::Always => Ok(true),
            AutoAccept::Never => Ok(false),
            AutoAccept::ContentApproved => content_approved(record),
        }
    }

    async fn reply(
        &self,
        record: &CredentialExchangeRecord,
        payload: AgentMessage,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match self.credentials.outbound(record, payload).await {
            Ok(outbound) => Ok(Some(outbound)),
            Err(err) => {
                error!(
                    "credential {}: no return path for auto accepted response: {}",
                    record.id, err
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<TStorage> MessageHandler for CredentialHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        [
            PROPOSE_CREDENTIAL,
            OFFER_CREDENTIAL,
            REQUEST_CREDENTIAL,
            ISSUE_CREDENTIAL,
            CREDENTIAL_ACK,
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
        match CredentialMessage::decode(&ctx.message)? {
            CredentialMessage::Proposal(_) => {
                let record = self.credentials.process_proposal(ctx).await?;
                if !self.should_accept(&record, proposal_matches_offer)? {
                    return Ok(None);
                }

                let (record, payload) = self
                    .credentials
                    .create_offer_for_proposal(record.id, AcceptProposalConfig::default())
                    .await?;
                self.reply(&record, payload).await
            }
            CredentialMessage::Offer(_) => {
                let record = self.credentials.process_offer(ctx).await?;
                if !self.should_accept(&record, proposal_matches_offer)? {
                    return Ok(None);
                }

                let (record, payload) = self
                    .credentials
                    .create_request(record.id, AcceptOfferConfig::default())
                    .await?;
                self.reply(&record, payload).await
            }
            CredentialMessage::Request(_) => {
                let record = self.credentials.process_request(ctx).await?;
                if !self.should_accept(&record, request_matches_offer)? {
                    return Ok(None);
                }

                let (record, payload) = self
                    .credentials
                    .create_credential(record.id, None)
                    .await?;
                self.reply(&record, payload).await
            }
            CredentialMessage::Credential(_) => {
                let record = self.credentials.process_credential(ctx).await?;
                info!(
                    "credential {}: stored as {:?}",
                    record.id, record.credential_id
                );

                // values were already checked against the offer while processing
                if !self.should_accept(&record, |_| Ok(true))? {
                    return Ok(None);
                }

                let (record, payload) = self.credentials.create_ack(record.id).await?;
                self.reply(&record, payload).await
            }
            CredentialMessage::Ack(_) => {
                let record = self.credentials.process_ack(ctx).await?;
                info!("credential {}: issuance acknowledged", record.id);
                Ok(None)
            }
            CredentialMessage::ProblemReport(_) => {
                let record = self.credentials.process_problem_report(ctx).await?;
                info!(
                    "credential {}: problem reported: {:?}",
                    record.id, record.error_message
                );
                Ok(None)
            }
        }
    }
}
