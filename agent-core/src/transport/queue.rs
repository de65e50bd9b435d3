use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_tokio::tokio::sync::Mutex;

use crate::wallet::EncryptedMessage;

use super::types::TransportError;

/// `MessageQueue` stores envelopes for recipients that pick them up later
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn add(&self, connection_id: String, message: EncryptedMessage)
        -> Result<(), TransportError>;

    /// `take` removes and returns at most `limit` messages, oldest first
    async fn take(
        &self,
        connection_id: String,
        limit: usize,
    ) -> Result<Vec<EncryptedMessage>, TransportError>;

    async fn count(&self, connection_id: String) -> Result<usize, TransportError>;
}

#[derive(Clone, Default)]
pub struct InMemoryMessageQueue {
    messages: Arc<Mutex<HashMap<String, VecDeque<EncryptedMessage>>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn add(
        &self,
        connection_id: String,
        message: EncryptedMessage,
    ) -> Result<(), TransportError> {
        self.messages
            .lock()
            .await
            .entry(connection_id)
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn take(
        &self,
        connection_id: String,
        limit: usize,
    ) -> Result<Vec<EncryptedMessage>, TransportError> {
        let mut messages = self.messages.lock().await;
        let (taken, drained) = match messages.get_mut(&connection_id) {
            Some(queue) => {
                let size = limit.min(queue.len());
                let taken: Vec<EncryptedMessage> = queue.drain(..size).collect();
                (taken, queue.is_empty())
            }
            None => (Vec::new(), false),
        };

        if drained {
            messages.remove(&connection_id);
        }

        Ok(taken)
    }

    async fn count(&self, connection_id: String) -> Result<usize, TransportError> {
        Ok(self
            .messages
            .lock()
            .await
            .get(&connection_id)
            .map(|queue| queue.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::with_tokio::tokio;

    fn build_message(tag: &str) -> EncryptedMessage {
        EncryptedMessage {
            protected: "protected".to_string(),
            iv: "iv".to_string(),
            ciphertext: "ciphertext".to_string(),
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn test_take_oldest_first_with_limit() {
        let queue = InMemoryMessageQueue::new();
        for tag in ["1", "2", "3"] {
            let _ = queue.add("conn-1".to_string(), build_message(tag)).await;
        }

        let taken = queue.take("conn-1".to_string(), 2).await.unwrap();
        let tags: Vec<String> = taken.into_iter().map(|msg| msg.tag).collect();
        assert_eq!(tags, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(queue.count("conn-1".to_string()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_take_drops_empty_connection() {
        let queue = InMemoryMessageQueue::new();
        let _ = queue.add("conn-1".to_string(), build_message("1")).await;

        let taken = queue.take("conn-1".to_string(), 5).await.unwrap();
        assert_eq!(taken.len(), 1);
        assert!(!queue.messages.lock().await.contains_key("conn-1"));
    }

    #[tokio::test]
    async fn test_take_unknown_connection() {
        let queue = InMemoryMessageQueue::new();
        let taken = queue.take("conn-1".to_string(), 10).await.unwrap();
        assert!(taken.is_empty());
        assert_eq!(queue.count("conn-1".to_string()).await.unwrap(), 0);
    }
}
