use std::collections::HashMap;
use std::sync::Arc;

use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::sync::RwLock;

use super::types::TransportSession;

/// `SessionRegistry` maps a connection id to the session its peer keeps open
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<dyn TransportSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: String, session: Arc<dyn TransportSession>) {
        debug!(
            "session: register {} session {} for connection {}",
            session.session_type(),
            session.id(),
            connection_id
        );

        self.sessions.write().await.insert(connection_id, session);
    }

    pub async fn find(&self, connection_id: &str) -> Option<Arc<dyn TransportSession>> {
        self.sessions.read().await.get(connection_id).cloned()
    }

    pub async fn remove(&self, connection_id: &str) {
        self.sessions.write().await.remove(connection_id);
    }

    /// `remove_session` drops every registration pointing at a closed session
    pub async fn remove_session(&self, session_id: &str) {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.id() != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::mock;
    use rst_common::standard::async_trait::async_trait;
    use rst_common::with_tokio::tokio;

    use crate::transport::TransportError;
    use crate::wallet::EncryptedMessage;

    mock!(
        FakeSession{}

        #[async_trait]
        impl TransportSession for FakeSession {
            fn id(&self) -> String;
            fn session_type(&self) -> String;
            async fn send(&self, message: EncryptedMessage) -> Result<(), TransportError>;
            async fn close(&self) -> Result<(), TransportError>;
        }
    );

    fn build_session(id: &'static str) -> Arc<dyn TransportSession> {
        let mut session = MockFakeSession::new();
        session.expect_id().returning(move || id.to_string());
        session
            .expect_session_type()
            .returning(|| "memory".to_string());
        Arc::new(session)
    }

    #[tokio::test]
    async fn test_register_and_find() {
        let registry = SessionRegistry::new();
        registry
            .register("conn-1".to_string(), build_session("session-1"))
            .await;

        let found = registry.find("conn-1").await;
        assert_eq!(found.unwrap().id(), "session-1".to_string());
        assert!(registry.find("conn-2").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_session() {
        let registry = SessionRegistry::new();
        let session = build_session("session-1");
        registry.register("conn-1".to_string(), session.clone()).await;
        registry.register("conn-2".to_string(), session).await;
        registry
            .register("conn-3".to_string(), build_session("session-3"))
            .await;

        registry.remove_session("session-1").await;
        assert!(registry.find("conn-1").await.is_none());
        assert!(registry.find("conn-2").await.is_none());
        assert!(registry.find("conn-3").await.is_some());
    }
}
