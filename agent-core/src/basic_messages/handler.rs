use rst_common::standard::async_trait::async_trait;

use crate::agent::{AgentError, InboundMessageContext, MessageHandler, OutboundMessage};
use crate::messaging::MessageType;
use crate::storage::StorageBuilder;

use super::messages::BASIC_MESSAGE;
use super::types::BasicMessageAPI;
use super::usecase::Usecase;

#[derive(Clone)]
pub struct BasicMessageHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    basic_messages: Usecase<TStorage>,
}

impl<TStorage> BasicMessageHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(basic_messages: Usecase<TStorage>) -> Self {
        Self { basic_messages }
    }
}

#[async_trait]
impl<TStorage> MessageHandler for BasicMessageHandler<TStorage>
where
    TStorage: StorageBuilder,
{
    fn supported_messages(&self) -> Vec<MessageType> {
        MessageType::parse(BASIC_MESSAGE).into_iter().collect()
    }

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        let _ = self.basic_messages.process_message(ctx).await?;
        Ok(None)
    }
}
