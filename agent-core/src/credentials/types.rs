use std::fmt;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::agent::{AutoAccept, InboundMessageContext, OutboundMessage};
use crate::connections::ConnectionError;
use crate::events::EventError;
use crate::ledger::LedgerError;
use crate::messaging::{AgentMessage, MessageError};
use crate::routing::RoutingError;
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::wallet::WalletError;

use super::preview::CredentialPreview;
use super::record::CredentialExchangeRecord;

/// `CredentialError` is a base error types for the issue credential domain
#[derive(Debug, PartialEq, Error, Clone)]
pub enum CredentialError {
    #[error("credential exchange {id} is in state {actual}, expected one of {expected:?}")]
    InvalidState {
        id: String,
        expected: Vec<CredentialState>,
        actual: CredentialState,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("problem report {code}: {description}")]
    ProblemReport { code: String, description: String },

    #[error(transparent)]
    StorageError(#[from] StorageError),

    #[error(transparent)]
    MessageError(#[from] MessageError),

    #[error(transparent)]
    WalletError(#[from] WalletError),

    #[error(transparent)]
    LedgerError(#[from] LedgerError),

    #[error(transparent)]
    TransportError(#[from] TransportError),

    #[error(transparent)]
    EventError(#[from] EventError),

    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),

    #[error(transparent)]
    RoutingError(#[from] RoutingError),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "kebab-case")]
pub enum CredentialState {
    ProposalSent,
    ProposalReceived,
    OfferSent,
    OfferReceived,
    Declined,
    RequestSent,
    RequestReceived,
    CredentialIssued,
    CredentialReceived,
    Done,
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            CredentialState::ProposalSent => "proposal-sent",
            CredentialState::ProposalReceived => "proposal-received",
            CredentialState::OfferSent => "offer-sent",
            CredentialState::OfferReceived => "offer-received",
            CredentialState::Declined => "declined",
            CredentialState::RequestSent => "request-sent",
            CredentialState::RequestReceived => "request-received",
            CredentialState::CredentialIssued => "credential-issued",
            CredentialState::CredentialReceived => "credential-received",
            CredentialState::Done => "done",
        };

        write!(f, "{}", tag)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProposeCredentialConfig {
    pub comment: Option<String>,
    pub credential_proposal: Option<CredentialPreview>,
    pub schema_issuer_did: Option<String>,
    pub schema_id: Option<String>,
    pub schema_name: Option<String>,
    pub schema_version: Option<String>,
    pub cred_def_id: Option<String>,
    pub issuer_did: Option<String>,
    pub auto_accept_credential: Option<AutoAccept>,
}

#[derive(Debug, Clone)]
pub struct OfferCredentialConfig {
    pub cred_def_id: String,
    pub preview: CredentialPreview,
    pub comment: Option<String>,
    pub auto_accept_credential: Option<AutoAccept>,
}

/// `AcceptProposalConfig` answers a proposal with an offer, missing values are taken
/// from the proposal itself
#[derive(Debug, Clone, Default)]
pub struct AcceptProposalConfig {
    pub cred_def_id: Option<String>,
    pub preview: Option<CredentialPreview>,
    pub comment: Option<String>,
    pub auto_accept_credential: Option<AutoAccept>,
}

#[derive(Debug, Clone, Default)]
pub struct AcceptOfferConfig {
    pub comment: Option<String>,
    pub auto_accept_credential: Option<AutoAccept>,
}

/// `CredentialAPI` drives the issuer and holder sides of issue-credential 1.0
///
/// `create_*` methods persist the state change and return the message without sending it,
/// the matching `accept_*`, `propose_*` and `offer_*` methods also deliver it
#[async_trait]
pub trait CredentialAPI: Clone + Send + Sync {
    async fn create_proposal(
        &self,
        connection_id: String,
        config: ProposeCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn propose_credential(
        &self,
        connection_id: String,
        config: ProposeCredentialConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn process_proposal(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn create_offer_for_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn accept_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn negotiate_proposal(
        &self,
        record_id: String,
        preview: CredentialPreview,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn create_offer(
        &self,
        connection_id: String,
        config: OfferCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn offer_credential(
        &self,
        connection_id: String,
        config: OfferCredentialConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    /// `create_out_of_band_offer` builds a connection-less offer carrying our `~service`
    async fn create_out_of_band_offer(
        &self,
        config: OfferCredentialConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn process_offer(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn negotiate_offer(
        &self,
        record_id: String,
        preview: CredentialPreview,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn create_request(
        &self,
        record_id: String,
        config: AcceptOfferConfig,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn accept_offer(
        &self,
        record_id: String,
        config: AcceptOfferConfig,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn decline_offer(
        &self,
        record_id: String,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn process_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn create_credential(
        &self,
        record_id: String,
        comment: Option<String>,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn accept_request(
        &self,
        record_id: String,
        comment: Option<String>,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn process_credential(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn create_ack(
        &self,
        record_id: String,
    ) -> Result<(CredentialExchangeRecord, AgentMessage), CredentialError>;

    async fn accept_credential(
        &self,
        record_id: String,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, CredentialError>;

    /// `outbound` resolves the return path of the exchange, its connection or the peer
    /// `~service` for connection-less exchanges
    async fn outbound(
        &self,
        record: &CredentialExchangeRecord,
        payload: AgentMessage,
    ) -> Result<OutboundMessage, CredentialError>;

    async fn get_by_id(&self, id: String) -> Result<CredentialExchangeRecord, CredentialError>;
    async fn find_by_id(
        &self,
        id: String,
    ) -> Result<Option<CredentialExchangeRecord>, CredentialError>;
    async fn get_all(&self) -> Result<Vec<CredentialExchangeRecord>, CredentialError>;

    /// `delete_by_id` also removes the stored credential from the wallet when asked to
    async fn delete_by_id(&self, id: String, delete_credential: bool)
        -> Result<(), CredentialError>;
}
