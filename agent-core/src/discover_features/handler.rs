use rst_common::standard::async_trait::async_trait;

use crate::agent::{AgentError, InboundMessageContext, MessageHandler, OutboundMessage};
use crate::messaging::MessageType;
use crate::storage::StorageBuilder;

use super::messages::{FeatureMessage, DISCLOSE, QUERY};
use super::types::DiscoverFeaturesAPI;
use super::usecase::Usecase;

#[derive(Clone)]
pub struct DiscoverFeaturesHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    features: Usecase<TStorage>,
}

impl<TStorage> DiscoverFeaturesHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(features: Usecase<TStorage>) -> Self {
        Self { features }
    }
}

#[async_trait]
impl<TStorage> MessageHandler for DiscoverFeaturesHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        [QUERY, DISCLOSE]
            .iter()
            .filter_map(|uri| MessageType::parse(uri).ok())
            .collect()
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        match FeatureMessage::decode(&ctx.message)? {
            FeatureMessage::Query(_) => {
                let payload = self.features.process_query(ctx).await?;
                let connection = ctx.assert_ready_connection()?;
                Ok(Some(OutboundMessage::Connection {
                    payload,
                    connection,
                }))
            }
            FeatureMessage::Disclose(_) => {
                let _ = self.features.process_disclose(ctx).await?;
                Ok(None)
            }
        }
    }
}
