use std::fmt;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::agent::InboundMessageContext;
use crate::connections::ConnectionError;
use crate::events::EventError;
use crate::messaging::{AgentMessage, MessageError};
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::wallet::WalletError;

use super::messages::KeylistUpdated;
use super::record::MediationRecord;

/// `RoutingError` is a base error types for the mediation and forward domain
#[derive(Debug, PartialEq, Error, Clone)]
pub enum RoutingError {
    #[error("mediation {id} is in state {actual}, expected one of {expected:?}")]
    InvalidState {
        id: String,
        expected: Vec<MediationState>,
        actual: MediationState,
    },

    #[error("mediation {id} has role {actual}, expected {expected}")]
    InvalidRole {
        id: String,
        expected: MediationRole,
        actual: MediationRole,
    },

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

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
    TransportError(#[from] TransportError),

    #[error(transparent)]
    EventError(#[from] EventError),

    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),
}

/// `MediationState` only moves forward, `denied` is terminal
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum MediationState {
    Init,
    Requested,
    Granted,
    Denied,
}

impl fmt::Display for MediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediationState::Init => write!(f, "init"),
            MediationState::Requested => write!(f, "requested"),
            MediationState::Granted => write!(f, "granted"),
            MediationState::Denied => write!(f, "denied"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum MediationRole {
    Recipient,
    Mediator,
}

impl fmt::Display for MediationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediationRole::Recipient => write!(f, "recipient"),
            MediationRole::Mediator => write!(f, "mediator"),
        }
    }
}

/// `Routing` is the key material of a new pairwise relationship
///
/// When a mediator is used, `endpoint` and `routing_keys` are the mediator's and `verkey`
/// is registered in the mediator keylist
#[derive(Debug, Clone, PartialEq)]
pub struct Routing {
    pub endpoint: String,
    pub did: String,
    pub verkey: String,
    pub routing_keys: Vec<String>,
    pub mediator_id: Option<String>,
}

/// `MediationRecipientAPI` is the recipient side of coordinate-mediation
#[async_trait]
pub trait MediationRecipientAPI: Clone + Send + Sync {
    async fn create_request(
        &self,
        connection_id: String,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError>;

    /// `request_mediation` sends a `mediate-request` on the given connection
    async fn request_mediation(&self, connection_id: String)
        -> Result<MediationRecord, RoutingError>;

    async fn process_grant(&self, ctx: &InboundMessageContext)
        -> Result<MediationRecord, RoutingError>;

    async fn process_deny(&self, ctx: &InboundMessageContext)
        -> Result<MediationRecord, RoutingError>;

    /// `keylist_update` registers the key with the mediator and waits for its answer
    async fn keylist_update(
        &self,
        mediation_id: String,
        verkey: String,
        timeout: Duration,
    ) -> Result<MediationRecord, RoutingError>;

    async fn process_keylist_update_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(MediationRecord, Vec<KeylistUpdated>), RoutingError>;

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError>;

    /// `process_batch` hands every picked up envelope back to the inbound pipeline
    async fn process_batch(&self, ctx: &InboundMessageContext) -> Result<usize, RoutingError>;

    async fn set_default_mediator(&self, mediation_id: String)
        -> Result<MediationRecord, RoutingError>;

    async fn get_default_mediator(&self) -> Result<Option<MediationRecord>, RoutingError>;

    /// `get_routing` provisions a new key, registered with the given mediator or the
    /// default one when a granted mediation exists
    async fn get_routing(&self, mediator_id: Option<String>) -> Result<Routing, RoutingError>;

    /// `return_when_granted` waits until the mediation is granted or denied
    async fn return_when_granted(
        &self,
        mediation_id: String,
        timeout: Duration,
    ) -> Result<MediationRecord, RoutingError>;

    /// `provision` connects to a mediator invitation, requests mediation and makes it the
    /// default mediator once granted
    async fn provision(&self, invitation_url: String) -> Result<MediationRecord, RoutingError>;

    async fn find_by_connection_id(
        &self,
        connection_id: String,
    ) -> Result<Option<MediationRecord>, RoutingError>;

    async fn get_by_id(&self, id: String) -> Result<MediationRecord, RoutingError>;
    async fn get_all(&self) -> Result<Vec<MediationRecord>, RoutingError>;
}

/// `MediatorAPI` is the mediator side of coordinate-mediation, routing and pickup
#[async_trait]
pub trait MediatorAPI: Clone + Send + Sync {
    async fn process_mediation_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, RoutingError>;

    async fn create_grant(
        &self,
        mediation_id: String,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError>;

    /// `grant_request` sends a `mediate-grant` carrying the mediator endpoint and routing key
    async fn grant_request(&self, mediation_id: String) -> Result<MediationRecord, RoutingError>;

    async fn deny_request(&self, mediation_id: String) -> Result<MediationRecord, RoutingError>;

    async fn process_keylist_update(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(MediationRecord, AgentMessage), RoutingError>;

    /// `process_forward` delivers the inner envelope to the recipient owning the `to` key
    /// without decrypting it
    async fn process_forward(&self, ctx: &InboundMessageContext) -> Result<(), RoutingError>;

    async fn process_batch_pickup(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, RoutingError>;

    async fn process_status_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, RoutingError>;

    /// `get_routing_keys` returns the mediator routing keys, provisioned on first use
    async fn get_routing_keys(&self) -> Result<Vec<String>, RoutingError>;

    async fn get_by_id(&self, id: String) -> Result<MediationRecord, RoutingError>;
    async fn get_all(&self) -> Result<Vec<MediationRecord>, RoutingError>;
}
