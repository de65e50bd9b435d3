use std::collections::BTreeMap;
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
use crate::wallet::anoncreds::{
    AttributeInfo, PredicateInfo, ProofRequest, RequestedCredentials, RevocationInterval,
};
use crate::wallet::WalletError;

use super::preview::PresentationPreview;
use super::record::ProofRecord;
use super::selection::RetrievedCredentials;

/// `ProofError` is a base error types for the present proof domain
#[derive(Debug, PartialEq, Error, Clone)]
pub enum ProofError {
    #[error("proof exchange {id} is in state {actual}, expected one of {expected:?}")]
    InvalidState {
        id: String,
        expected: Vec<ProofState>,
        actual: ProofState,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("presentation problem report {code}: {description}")]
    PresentationProblemReport { code: String, description: String },

    #[error("no credentials available: {0}")]
    NoCredentialsAvailable(String),

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
pub enum ProofState {
    ProposalSent,
    ProposalReceived,
    RequestSent,
    RequestReceived,
    PresentationSent,
    PresentationReceived,
    Declined,
    Abandoned,
    Done,
}

impl ProofState {
    /// `is_terminal` is true once the exchange accepts no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProofState::Done | ProofState::Declined | ProofState::Abandoned
        )
    }
}

impl fmt::Display for ProofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ProofState::ProposalSent => "proposal-sent",
            ProofState::ProposalReceived => "proposal-received",
            ProofState::RequestSent => "request-sent",
            ProofState::RequestReceived => "request-received",
            ProofState::PresentationSent => "presentation-sent",
            ProofState::PresentationReceived => "presentation-received",
            ProofState::Declined => "declined",
            ProofState::Abandoned => "abandoned",
            ProofState::Done => "done",
        };

        write!(f, "{}", tag)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProposeProofConfig {
    pub comment: Option<String>,
    pub auto_accept_proof: Option<AutoAccept>,
}

/// `RequestProofConfig` describes a proof request, the nonce is generated by the wallet
/// when missing
#[derive(Debug, Clone, Default)]
pub struct RequestProofConfig {
    pub name: Option<String>,
    pub version: Option<String>,
    pub nonce: Option<String>,
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
    pub non_revoked: Option<RevocationInterval>,
    pub comment: Option<String>,
    pub auto_accept_proof: Option<AutoAccept>,
}

#[derive(Debug, Clone, Default)]
pub struct AcceptProposalConfig {
    pub name: Option<String>,
    pub version: Option<String>,
    pub comment: Option<String>,
    pub auto_accept_proof: Option<AutoAccept>,
}

/// `ProofAPI` drives the prover and verifier sides of present-proof 1.0
#[async_trait]
pub trait ProofAPI: Clone + Send + Sync {
    async fn create_proposal(
        &self,
        connection_id: String,
        preview: PresentationPreview,
        config: ProposeProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn propose_proof(
        &self,
        connection_id: String,
        preview: PresentationPreview,
        config: ProposeProofConfig,
    ) -> Result<ProofRecord, ProofError>;

    async fn process_proposal(&self, ctx: &InboundMessageContext)
        -> Result<ProofRecord, ProofError>;

    async fn create_request_for_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn accept_proposal(
        &self,
        record_id: String,
        config: AcceptProposalConfig,
    ) -> Result<ProofRecord, ProofError>;

    async fn create_request(
        &self,
        connection_id: String,
        config: RequestProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn request_proof(
        &self,
        connection_id: String,
        config: RequestProofConfig,
    ) -> Result<ProofRecord, ProofError>;

    /// `create_out_of_band_request` builds a connection-less request carrying our `~service`
    async fn create_out_of_band_request(
        &self,
        config: RequestProofConfig,
    ) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn process_request(&self, ctx: &InboundMessageContext)
        -> Result<ProofRecord, ProofError>;

    /// `get_requested_credentials_for_proof_request` lists the candidates of every
    /// referent, narrowed by the proposal when one is given
    async fn get_requested_credentials_for_proof_request(
        &self,
        proof_request: &ProofRequest,
        presentation_proposal: Option<PresentationPreview>,
        filter_by_non_revocation_requirements: bool,
    ) -> Result<RetrievedCredentials, ProofError>;

    fn auto_select_credentials_for_proof_request(
        &self,
        retrieved: RetrievedCredentials,
    ) -> Result<RequestedCredentials, ProofError>;

    async fn create_presentation(
        &self,
        record_id: String,
        requested_credentials: RequestedCredentials,
        comment: Option<String>,
    ) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn accept_request(
        &self,
        record_id: String,
        requested_credentials: RequestedCredentials,
        comment: Option<String>,
    ) -> Result<ProofRecord, ProofError>;

    async fn decline_request(&self, record_id: String) -> Result<ProofRecord, ProofError>;

    async fn process_presentation(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofRecord, ProofError>;

    async fn create_ack(&self, record_id: String) -> Result<(ProofRecord, AgentMessage), ProofError>;

    async fn accept_presentation(&self, record_id: String) -> Result<ProofRecord, ProofError>;

    async fn process_ack(&self, ctx: &InboundMessageContext) -> Result<ProofRecord, ProofError>;

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofRecord, ProofError>;

    async fn outbound(
        &self,
        record: &ProofRecord,
        payload: AgentMessage,
    ) -> Result<OutboundMessage, ProofError>;

    async fn get_by_id(&self, id: String) -> Result<ProofRecord, ProofError>;
    async fn find_by_id(&self, id: String) -> Result<Option<ProofRecord>, ProofError>;
    async fn get_all(&self) -> Result<Vec<ProofRecord>, ProofError>;
    async fn delete_by_id(&self, id: String) -> Result<(), ProofError>;
}
