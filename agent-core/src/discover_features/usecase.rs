use std::collections::BTreeSet;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;

use crate::agent::{InboundMessageContext, MessageSender};
use crate::connections::{ConnectionAPI, ConnectionError, ConnectionUsecase};
use crate::messaging::{AgentMessage, MessageType};
use crate::storage::StorageBuilder;

use super::messages::{FeatureDisclose, FeatureQuery, ProtocolDescriptor, DISCLOSE, QUERY};
use super::types::{DiscoverFeaturesAPI, DiscoverFeaturesError};

#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    connections: ConnectionUsecase<TStorage>,
    sender: MessageSender,
    protocols: Vec<String>,
}

impl<TStorage> Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    /// `new` takes the message types registered on the dispatcher, discover-features
    /// itself is always part of the answer
    pub fn new(
        connections: ConnectionUsecase<TStorage>,
        sender: MessageSender,
        supported_messages: Vec<MessageType>,
    ) -> Self {
        let own = [QUERY, DISCLOSE]
            .iter()
            .filter_map(|uri| MessageType::parse(uri).ok());

        let protocols: BTreeSet<String> = supported_messages
            .into_iter()
            .chain(own)
            .map(|message_type| message_type.protocol_uri())
            .collect();

        Self {
            connections,
            sender,
            protocols: protocols.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<TStorage> DiscoverFeaturesAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_protocols(&self) -> Vec<String> {
        self.protocols.clone()
    }

    async fn send_query(
        &self,
        connection_id: String,
        query: String,
        comment: Option<String>,
    ) -> Result<AgentMessage, DiscoverFeaturesError> {
        let connection = self.connections.get_by_id(connection_id).await?;
        if !connection.is_ready() {
            return Err(ConnectionError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            ))
            .into());
        }

        let message = AgentMessage::new(&FeatureQuery { query, comment })?;
        self.sender.send_message(message.clone(), &connection).await?;
        Ok(message)
    }

    async fn process_query(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<AgentMessage, DiscoverFeaturesError> {
        let connection = ctx.assert_ready_connection()?;
        let query: FeatureQuery = ctx.message.decode()?;

        let protocols: Vec<ProtocolDescriptor> = self
            .protocols
            .iter()
            .filter(|pid| query.matches(pid))
            .map(|pid| ProtocolDescriptor {
                pid: pid.to_owned(),
                roles: None,
            })
            .collect();

        debug!(
            "discover features: {} protocols match {} for connection {}",
            protocols.len(),
            query.query,
            connection.id
        );

        let message = AgentMessage::new(&FeatureDisclose { protocols })?
            .with_thread_id(&ctx.message.thread_id());
        Ok(message)
    }

    async fn process_disclose(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<FeatureDisclose, DiscoverFeaturesError> {
        let _ = ctx.assert_ready_connection()?;
        Ok(ctx.message.decode()?)
    }
}
