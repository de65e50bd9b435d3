use std::fmt;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::agent::InboundMessageContext;
use crate::connections::ConnectionError;
use crate::messaging::MessageError;
use crate::storage::StorageError;
use crate::transport::TransportError;

use super::record::BasicMessageRecord;

#[derive(Debug, PartialEq, Error, Clone)]
pub enum BasicMessageError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    StorageError(#[from] StorageError),

    #[error(transparent)]
    MessageError(#[from] MessageError),

    #[error(transparent)]
    TransportError(#[from] TransportError),

    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum BasicMessageRole {
    Sender,
    Receiver,
}

impl fmt::Display for BasicMessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasicMessageRole::Sender => write!(f, "sender"),
            BasicMessageRole::Receiver => write!(f, "receiver"),
        }
    }
}

#[async_trait]
pub trait BasicMessageAPI: Clone + Send + Sync {
    /// `send_message` requires a ready connection, the record is stored before sending
    async fn send_message(
        &self,
        connection_id: String,
        content: String,
    ) -> Result<BasicMessageRecord, BasicMessageError>;

    async fn process_message(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<BasicMessageRecord, BasicMessageError>;

    async fn find_by_connection_id(
        &self,
        connection_id: String,
    ) -> Result<Vec<BasicMessageRecord>, BasicMessageError>;

    async fn get_all(&self) -> Result<Vec<BasicMessageRecord>, BasicMessageError>;
    async fn delete_by_id(&self, id: String) -> Result<(), BasicMessageError>;
}
