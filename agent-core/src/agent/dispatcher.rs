use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;

use crate::messaging::MessageType;

use super::context::{InboundMessageContext, OutboundMessage};
use super::types::AgentError;

/// `MessageHandler` processes the inbound messages of one protocol
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn supported_messages(&self) -> Vec<MessageType>;

    async fn handle(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError>;
}

/// `Dispatcher` routes an inbound message to the handler registered for its type
///
/// When no handler matches exactly, a handler of the same protocol, major version and
/// message name is chosen: the highest registered minor version below the incoming one,
/// otherwise the lowest one above it
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Vec<(MessageType, Arc<dyn MessageHandler>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        for message_type in handler.supported_messages() {
            debug!("dispatcher: register handler for {}", message_type);
            self.handlers.push((message_type, handler.clone()));
        }
    }

    pub fn supported_messages(&self) -> Vec<MessageType> {
        self.handlers
            .iter()
            .map(|(message_type, _)| message_type.to_owned())
            .collect()
    }

    pub fn resolve(&self, incoming: &MessageType) -> Result<Arc<dyn MessageHandler>, AgentError> {
        if let Some((_, handler)) = self
            .handlers
            .iter()
            .find(|(message_type, _)| message_type == incoming)
        {
            return Ok(handler.clone());
        }

        let family = self
            .handlers
            .iter()
            .filter(|(message_type, _)| message_type.is_same_family(incoming));

        let lower = family
            .clone()
            .filter(|(message_type, _)| message_type.minor() < incoming.minor())
            .max_by_key(|(message_type, _)| message_type.minor());

        let higher = family
            .filter(|(message_type, _)| message_type.minor() > incoming.minor())
            .min_by_key(|(message_type, _)| message_type.minor());

        lower
            .or(higher)
            .map(|(message_type, handler)| {
                debug!("dispatcher: {} handled as {}", incoming, message_type);
                handler.clone()
            })
            .ok_or_else(|| AgentError::UnsupportedMessage(incoming.to_string()))
    }

    pub async fn dispatch(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutboundMessage>, AgentError> {
        let message_type = ctx.message.message_type()?;
        let handler = self.resolve(&message_type)?;
        handler.handle(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::mock;
    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use crate::messaging::AgentMessage;

    mock!(
        FakeHandler{}

        #[async_trait]
        impl MessageHandler for FakeHandler {
            fn supported_messages(&self) -> Vec<MessageType>;

            async fn handle(
                &self,
                ctx: &InboundMessageContext,
            ) -> Result<Option<OutboundMessage>, AgentError>;
        }
    );

    fn build_handler(types: Vec<&'static str>, calls: usize) -> Arc<dyn MessageHandler> {
        let mut handler = MockFakeHandler::new();
        handler.expect_supported_messages().returning(move || {
            types
                .iter()
                .map(|uri| MessageType::parse(uri).unwrap())
                .collect()
        });
        handler.expect_handle().times(calls).returning(|_| Ok(None));
        Arc::new(handler)
    }

    fn parse(uri: &str) -> MessageType {
        MessageType::parse(uri).unwrap()
    }

    #[test]
    fn test_resolve_minor_version_fallback() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(build_handler(
            vec!["https://didcomm.org/fake-protocol/1.1/message"],
            0,
        ));
        dispatcher.register(build_handler(
            vec!["https://didcomm.org/fake-protocol/1.3/message"],
            0,
        ));

        let table = vec![
            ("https://didcomm.org/fake-protocol/1.1/message", 1),
            ("https://didcomm.org/fake-protocol/1.3/message", 3),
            ("https://didcomm.org/fake-protocol/1.2/message", 1),
            ("https://didcomm.org/fake-protocol/1.9/message", 3),
            ("https://didcomm.org/fake-protocol/1.0/message", 1),
        ];

        for (incoming, expected_minor) in table {
            let resolved = dispatcher.resolve(&parse(incoming));
            assert!(!resolved.is_err());

            let minor = resolved
                .unwrap()
                .supported_messages()
                .first()
                .map(|message_type| message_type.minor())
                .unwrap();
            assert_eq!(minor, expected_minor, "incoming {}", incoming);
        }
    }

    #[test]
    fn test_resolve_other_major_unsupported() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(build_handler(
            vec!["https://didcomm.org/fake-protocol/1.0/message"],
            0,
        ));

        let resolved = dispatcher.resolve(&parse("https://didcomm.org/fake-protocol/2.0/message"));
        assert!(matches!(
            resolved.err().unwrap(),
            AgentError::UnsupportedMessage(_)
        ))
    }

    #[tokio::test]
    async fn test_dispatch_to_handler() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(build_handler(
            vec!["https://didcomm.org/fake-protocol/1.0/message"],
            1,
        ));

        let message = AgentMessage::from_value(json!({
            "@id": "1",
            "@type": "https://didcomm.org/fake-protocol/1.0/message",
        }))
        .unwrap();

        let dispatched = dispatcher
            .dispatch(&InboundMessageContext::new(message))
            .await;
        assert!(dispatched.unwrap().is_none());
    }
}
