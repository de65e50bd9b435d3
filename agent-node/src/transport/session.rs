use std::sync::atomic::{AtomicBool, Ordering};

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::uuid::Uuid;
use rst_common::with_tokio::tokio::sync::Mutex;

use prople_agent_core::transport::{TransportError, TransportSession};
use prople_agent_core::wallet::EncryptedMessage;

pub const HTTP_SESSION: &str = "http";

/// `HttpSession` is the return route of one inbound HTTP request
///
/// It accepts a single reply, the request answers with it once processing is done
#[derive(Default)]
pub struct HttpSession {
    id: String,
    reply: Mutex<Option<EncryptedMessage>>,
    closed: AtomicBool,
}

impl HttpSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    /// `take_reply` closes the session and returns the reply written to it, if any
    pub async fn take_reply(&self) -> Option<EncryptedMessage> {
        self.closed.store(true, Ordering::SeqCst);
        self.reply.lock().await.take()
    }
}

#[async_trait]
impl TransportSession for HttpSession {
    fn id(&self) -> String {
        self.id.to_owned()
    }

    fn session_type(&self) -> String {
        HTTP_SESSION.to_string()
    }

    async fn send(&self, message: EncryptedMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed(self.id.to_owned()));
        }

        let mut reply = self.reply.lock().await;
        if reply.is_some() {
            return Err(TransportError::SessionClosed(format!(
                "{}: reply already written",
                self.id
            )));
        }

        *reply = Some(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
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
    async fn test_single_reply() {
        let session = HttpSession::new();
        assert!(!session.send(build_message("first")).await.is_err());

        let second = session.send(build_message("second")).await;
        assert!(matches!(second, Err(TransportError::SessionClosed(_))));

        let reply = session.take_reply().await;
        assert_eq!(reply.map(|msg| msg.tag), Some("first".to_string()));

        let after_close = session.send(build_message("third")).await;
        assert!(matches!(after_close, Err(TransportError::SessionClosed(_))))
    }
}
