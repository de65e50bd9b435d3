use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::Value;
use rst_common::with_logging::log::debug;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use prople_agent_core::transport::{OutboundPackage, OutboundTransport, TransportError};

use super::DIDCOMM_CONTENT_TYPE;

/// `HttpOutboundTransport` delivers packages to `http` and `https` endpoints
#[derive(Clone, Default)]
pub struct HttpOutboundTransport {
    client: Client,
}

impl HttpOutboundTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboundTransport for HttpOutboundTransport {
    fn supported_schemes(&self) -> Vec<String> {
        vec!["http".to_string(), "https".to_string()]
    }

    async fn send(&self, package: OutboundPackage) -> Result<Option<Value>, TransportError> {
        let endpoint = package
            .endpoint
            .ok_or_else(|| TransportError::SendError("endpoint was missing".to_string()))?;

        debug!("http transport: send to {}", endpoint);
        let response = self
            .client
            .post(endpoint.as_str())
            .header(CONTENT_TYPE, DIDCOMM_CONTENT_TYPE)
            .json(&package.payload)
            .send()
            .await
            .map_err(|err| TransportError::SendError(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::SendError(format!(
                "{} answered with status {}",
                endpoint, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::SendError(err.to_string()))?;

        if body.is_empty() {
            return Ok(None);
        }

        match rst_common::standard::serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!("http transport: ignore non json response from {}: {}", endpoint, err);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockito::{Matcher, Server};
    use rst_common::standard::serde_json::{self, json};
    use rst_common::with_tokio::tokio;

    use prople_agent_core::wallet::EncryptedMessage;

    fn build_package(endpoint: Option<String>) -> OutboundPackage {
        OutboundPackage {
            payload: EncryptedMessage {
                protected: "protected".to_string(),
                iv: "iv".to_string(),
                ciphertext: "ciphertext".to_string(),
                tag: "tag".to_string(),
            },
            endpoint,
            response_requested: false,
            connection_id: None,
        }
    }

    #[tokio::test]
    async fn test_send_without_response() {
        let mut server = Server::new_async().await;
        let package = build_package(Some(format!("{}/didcomm", server.url())));
        let payload = serde_json::to_value(&package.payload).unwrap();

        let mock = server
            .mock("POST", "/didcomm")
            .match_header("content-type", DIDCOMM_CONTENT_TYPE)
            .match_body(Matcher::Json(payload))
            .with_status(202)
            .create_async()
            .await;

        let transport = HttpOutboundTransport::new();
        let sent = transport.send(package).await;

        mock.assert();
        assert!(matches!(sent, Ok(None)))
    }

    #[tokio::test]
    async fn test_send_with_return_route_response() {
        let mut server = Server::new_async().await;
        let reply = json!({
            "protected": "reply-protected",
            "iv": "reply-iv",
            "ciphertext": "reply-ciphertext",
            "tag": "reply-tag",
        });

        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", DIDCOMM_CONTENT_TYPE)
            .with_body(reply.to_string())
            .create_async()
            .await;

        let transport = HttpOutboundTransport::new();
        let sent = transport.send(build_package(Some(server.url()))).await;

        mock.assert();
        assert_eq!(sent.unwrap(), Some(reply))
    }

    #[tokio::test]
    async fn test_send_failed_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let transport = HttpOutboundTransport::new();
        let sent = transport.send(build_package(Some(server.url()))).await;

        mock.assert();
        assert!(matches!(sent.unwrap_err(), TransportError::SendError(msg) if msg.contains("500")))
    }

    #[tokio::test]
    async fn test_send_missing_endpoint() {
        let transport = HttpOutboundTransport::new();
        let sent = transport.send(build_package(None)).await;
        assert!(matches!(sent.unwrap_err(), TransportError::SendError(_)))
    }

    #[test]
    fn test_supported_schemes() {
        let transport = HttpOutboundTransport::new();
        assert_eq!(
            transport.supported_schemes(),
            vec!["http".to_string(), "https".to_string()]
        )
    }
}
