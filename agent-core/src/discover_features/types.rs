use rst_common::standard::async_trait::async_trait;
use rst_common::with_errors::thiserror::{self, Error};

use crate::agent::InboundMessageContext;
use crate::connections::ConnectionError;
use crate::messaging::{AgentMessage, MessageError};
use crate::transport::TransportError;

use super::messages::FeatureDisclose;

#[derive(Debug, PartialEq, Error, Clone)]
pub enum DiscoverFeaturesError {
    #[error(transparent)]
    MessageError(#[from] MessageError),

    #[error(transparent)]
    TransportError(#[from] TransportError),

    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),
}

#[async_trait]
pub trait DiscoverFeaturesAPI: Clone + Send + Sync {
    /// `supported_protocols` lists the protocol uris this agent handles, sorted
    fn supported_protocols(&self) -> Vec<String>;

    /// `send_query` asks the peer of a ready connection which protocols match `query`
    async fn send_query(
        &self,
        connection_id: String,
        query: String,
        comment: Option<String>,
    ) -> Result<AgentMessage, DiscoverFeaturesError>;

    /// `process_query` builds the disclose answer threaded on the query
    async fn process_query(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, DiscoverFeaturesError>;

    /// `process_disclose` only checks the connection, callers read the answer from the
    /// message processed event
    async fn process_disclose(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<FeatureDisclose, DiscoverFeaturesError>;
}
