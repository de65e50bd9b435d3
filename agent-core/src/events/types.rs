use rst_common::with_errors::thiserror::{self, Error};

use crate::basic_messages::{BasicMessage, BasicMessageRecord};
use crate::connections::{ConnectionRecord, ConnectionState};
use crate::credentials::{CredentialExchangeRecord, CredentialState};
use crate::messaging::AgentMessage;
use crate::proofs::{ProofRecord, ProofState};
use crate::routing::{MediationRecord, MediationState};

#[derive(Debug, PartialEq, Error, Clone)]
pub enum EventError {
    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("event bus closed")]
    Closed,

    #[error("subscriber lagged, {0} events skipped")]
    Lagged(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ConnectionStateChanged,
    CredentialStateChanged,
    ProofStateChanged,
    MediationStateChanged,
    BasicMessageStateChanged,
    AgentMessageProcessed,
}

/// `AgentEvent` carries a detached snapshot of the record that changed
///
/// `previous_state` is `None` when the record was just created
#[derive(Debug, Clone)]
pub enum AgentEvent {
    ConnectionStateChanged {
        record: ConnectionRecord,
        previous_state: Option<ConnectionState>,
    },
    CredentialStateChanged {
        record: CredentialExchangeRecord,
        previous_state: Option<CredentialState>,
    },
    ProofStateChanged {
        record: ProofRecord,
        previous_state: Option<ProofState>,
    },
    MediationStateChanged {
        record: MediationRecord,
        previous_state: Option<MediationState>,
    },
    BasicMessageStateChanged {
        record: BasicMessageRecord,
        message: BasicMessage,
    },
    AgentMessageProcessed {
        message: AgentMessage,
        connection_id: Option<String>,
    },
}

impl AgentEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            AgentEvent::ConnectionStateChanged { .. } => EventType::ConnectionStateChanged,
            AgentEvent::CredentialStateChanged { .. } => EventType::CredentialStateChanged,
            AgentEvent::ProofStateChanged { .. } => EventType::ProofStateChanged,
            AgentEvent::MediationStateChanged { .. } => EventType::MediationStateChanged,
            AgentEvent::BasicMessageStateChanged { .. } => EventType::BasicMessageStateChanged,
            AgentEvent::AgentMessageProcessed { .. } => EventType::AgentMessageProcessed,
        }
    }
}
