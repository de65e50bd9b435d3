use std::fmt;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::agent::InboundMessageContext;
use crate::events::EventError;
use crate::messaging::{AgentMessage, MessageError};
use crate::routing::Routing;
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::wallet::WalletError;

use super::messages::ConnectionInvitation;
use super::record::ConnectionRecord;

/// `ConnectionError` is a base error types for the `connections` domain
#[derive(Debug, PartialEq, Error, Clone)]
pub enum ConnectionError {
    #[error("connection {id} is in state {actual}, expected one of {expected:?}")]
    InvalidState {
        id: String,
        expected: Vec<ConnectionState>,
        actual: ConnectionState,
    },

    #[error("connection {id} has role {actual}, expected {expected}")]
    InvalidRole {
        id: String,
        expected: ConnectionRole,
        actual: ConnectionRole,
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
    TransportError(#[from] TransportError),

    #[error(transparent)]
    EventError(#[from] EventError),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Invited,
    Requested,
    Responded,
    #[serde(rename = "complete")]
    Completed,
    Abandoned,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ConnectionState::Invited => "invited",
            ConnectionState::Requested => "requested",
            ConnectionState::Responded => "responded",
            ConnectionState::Completed => "complete",
            ConnectionState::Abandoned => "abandoned",
        };

        write!(f, "{}", state)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Inviter,
    Invitee,
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Inviter => write!(f, "inviter"),
            ConnectionRole::Invitee => write!(f, "invitee"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateInvitationConfig {
    pub label: Option<String>,
    pub alias: Option<String>,
    pub image_url: Option<String>,
    pub multi_use: bool,
    pub auto_accept: Option<bool>,
    pub routing: Routing,
}

#[derive(Debug, Clone)]
pub struct ReceiveInvitationConfig {
    pub alias: Option<String>,
    pub auto_accept: Option<bool>,
    pub routing: Routing,
}

/// `ConnectionAPI` is the main entrypoint of the `connections` domain
///
/// Methods named `create_*` only build the next message and persist the state change, the
/// `accept_*` methods also send the built message to the peer
#[async_trait]
pub trait ConnectionAPI: Clone + Send + Sync {
    /// `create_invitation` persists an inviter record in [`ConnectionState::Invited`]
    async fn create_invitation(
        &self,
        config: CreateInvitationConfig,
    ) -> Result<(ConnectionRecord, ConnectionInvitation), ConnectionError>;

    /// `receive_invitation` reuses an existing record created from the same invitation key
    /// unless that record was abandoned
    async fn receive_invitation(
        &self,
        invitation: ConnectionInvitation,
        config: ReceiveInvitationConfig,
    ) -> Result<ConnectionRecord, ConnectionError>;

    async fn receive_invitation_from_url(
        &self,
        url: String,
        config: ReceiveInvitationConfig,
    ) -> Result<ConnectionRecord, ConnectionError>;

    async fn create_request(
        &self,
        connection_id: String,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError>;

    async fn accept_invitation(&self, connection_id: String)
        -> Result<ConnectionRecord, ConnectionError>;

    /// `process_request` forks a new record when the invitation is multi use, the given
    /// routing is used for the forked record keys
    async fn process_request(
        &self,
        ctx: &InboundMessageContext,
        routing: Option<Routing>,
    ) -> Result<ConnectionRecord, ConnectionError>;

    async fn create_response(
        &self,
        connection_id: String,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError>;

    async fn accept_request(&self, connection_id: String)
        -> Result<ConnectionRecord, ConnectionError>;

    async fn process_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ConnectionError>;

    /// `create_trust_ping` completes a [`ConnectionState::Responded`] connection
    async fn create_trust_ping(
        &self,
        connection_id: String,
        response_requested: bool,
    ) -> Result<(ConnectionRecord, AgentMessage), ConnectionError>;

    async fn accept_response(&self, connection_id: String)
        -> Result<ConnectionRecord, ConnectionError>;

    async fn process_ping(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(ConnectionRecord, Option<AgentMessage>), ConnectionError>;

    async fn process_ack(&self, ctx: &InboundMessageContext)
        -> Result<ConnectionRecord, ConnectionError>;

    async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ConnectionError>;

    /// `return_when_connected` waits until the connection reaches
    /// [`ConnectionState::Completed`], the record is never touched
    async fn return_when_connected(
        &self,
        connection_id: String,
        timeout: Duration,
    ) -> Result<ConnectionRecord, ConnectionError>;

    async fn find_by_verkey(&self, verkey: String)
        -> Result<Option<ConnectionRecord>, ConnectionError>;
    async fn find_by_their_key(
        &self,
        verkey: String,
    ) -> Result<Option<ConnectionRecord>, ConnectionError>;
    async fn find_by_invitation_key(
        &self,
        key: String,
    ) -> Result<Option<ConnectionRecord>, ConnectionError>;
    async fn get_by_id(&self, id: String) -> Result<ConnectionRecord, ConnectionError>;
    async fn find_by_id(&self, id: String) -> Result<Option<ConnectionRecord>, ConnectionError>;
    async fn get_all(&self) -> Result<Vec<ConnectionRecord>, ConnectionError>;
    async fn delete_by_id(&self, id: String) -> Result<(), ConnectionError>;
}
