use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

/// `MessageError` is a base error types for message parsing and validation
///
/// [`MessageError::ValidationError`] collects every failed rule of a message body
/// instead of stopping at the first one
#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum MessageError {
    #[error("invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("validation error: {}", .0.join(", "))]
    ValidationError(Vec<String>),

    #[error("json error: {0}")]
    JSONError(String),

    #[error("attachment error: {0}")]
    AttachmentError(String),

    #[error("invitation error: {0}")]
    InvitationError(String),
}
