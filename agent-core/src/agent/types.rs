use rst_common::with_errors::thiserror::{self, Error};

use crate::basic_messages::BasicMessageError;
use crate::connections::messages::PROBLEM_REPORT as CONNECTION_PROBLEM_REPORT;
use crate::connections::ConnectionError;
use crate::credentials::messages::PROBLEM_REPORT as CREDENTIAL_PROBLEM_REPORT;
use crate::credentials::CredentialError;
use crate::discover_features::DiscoverFeaturesError;
use crate::events::EventError;
use crate::ledger::LedgerError;
use crate::messaging::{MessageError, ProblemReport, NOTIFICATION_PROBLEM_REPORT};
use crate::proofs::messages::PROBLEM_REPORT as PRESENTATION_PROBLEM_REPORT;
use crate::proofs::ProofError;
use crate::routing::RoutingError;
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::wallet::WalletError;

/// `AgentError` is the error seen at the dispatcher seam, it wraps every domain error
#[derive(Debug, PartialEq, Error, Clone)]
pub enum AgentError {
    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),

    #[error("config error: {0}")]
    ConfigError(String),

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
    CredentialError(#[from] CredentialError),

    #[error(transparent)]
    ProofError(#[from] ProofError),

    #[error(transparent)]
    RoutingError(#[from] RoutingError),

    #[error(transparent)]
    BasicMessageError(#[from] BasicMessageError),

    #[error(transparent)]
    DiscoverFeaturesError(#[from] DiscoverFeaturesError),
}

impl AgentError {
    /// `problem_report` returns the `(@type, body)` reported back to the sender, errors
    /// without a report are only logged
    pub fn problem_report(&self) -> Option<(String, ProblemReport)> {
        match self {
            AgentError::UnsupportedMessage(message_type) => Some((
                NOTIFICATION_PROBLEM_REPORT.to_string(),
                ProblemReport::new(
                    "unsupported-message",
                    &format!("message type {} is not supported", message_type),
                ),
            )),
            AgentError::MessageError(MessageError::ValidationError(errors)) => Some((
                NOTIFICATION_PROBLEM_REPORT.to_string(),
                ProblemReport::new("message-parse-failure", &errors.join(", ")),
            )),
            AgentError::ConnectionError(ConnectionError::ProblemReport { code, description }) => {
                Some((
                    CONNECTION_PROBLEM_REPORT.to_string(),
                    ProblemReport::new(code, description),
                ))
            }
            AgentError::CredentialError(CredentialError::ProblemReport { code, description }) => {
                Some((
                    CREDENTIAL_PROBLEM_REPORT.to_string(),
                    ProblemReport::new(code, description),
                ))
            }
            AgentError::ProofError(ProofError::PresentationProblemReport {
                code,
                description,
            }) => Some((
                PRESENTATION_PROBLEM_REPORT.to_string(),
                ProblemReport::new(code, description),
            )),
            _ => None,
        }
    }
}
