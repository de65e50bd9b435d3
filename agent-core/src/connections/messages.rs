use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use url::Url;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;
use rst_common::standard::uuid::Uuid;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::messaging::{Ack, AgentMessage, MessageBody, MessageError, ProblemReport};

use super::did_doc::DidDoc;
use super::signature::SignatureDecorator;

pub const INVITATION: &str = "https://didcomm.org/connections/1.0/invitation";
pub const REQUEST: &str = "https://didcomm.org/connections/1.0/request";
pub const RESPONSE: &str = "https://didcomm.org/connections/1.0/response";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/connections/1.0/problem_report";
pub const TRUST_PING: &str = "https://didcomm.org/trust_ping/1.0/ping";
pub const TRUST_PING_RESPONSE: &str = "https://didcomm.org/trust_ping/1.0/ping_response";

const INVITATION_PARAM: &str = "c_i";
const LEGACY_INVITATION_PARAM: &str = "d_m";

/// `ConnectionInvitation` is the out-of-band payload that bootstraps a connection
///
/// It is either a public DID invitation or carries inline `recipientKeys` and
/// `serviceEndpoint`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectionInvitation {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type")]
    pub message_type: String,

    pub label: String,

    #[serde(rename = "recipientKeys", skip_serializing_if = "Option::is_none", default)]
    pub recipient_keys: Option<Vec<String>>,

    #[serde(rename = "serviceEndpoint", skip_serializing_if = "Option::is_none", default)]
    pub service_endpoint: Option<String>,

    #[serde(rename = "routingKeys", skip_serializing_if = "Option::is_none", default)]
    pub routing_keys: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub did: Option<String>,

    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
}

impl ConnectionInvitation {
    pub fn new(
        label: String,
        recipient_keys: Vec<String>,
        service_endpoint: String,
        routing_keys: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: INVITATION.to_string(),
            label,
            recipient_keys: Some(recipient_keys),
            service_endpoint: Some(service_endpoint),
            routing_keys: Some(routing_keys),
            did: None,
            image_url: None,
        }
    }

    pub fn invitation_key(&self) -> Option<String> {
        self.recipient_keys
            .as_ref()
            .and_then(|keys| keys.first().cloned())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.label.is_empty() {
            errors.push("label was missing".to_string());
        }

        let has_keys = self
            .recipient_keys
            .as_ref()
            .map(|keys| !keys.is_empty())
            .unwrap_or(false);

        let inline = has_keys && self.service_endpoint.is_some();
        if self.did.is_none() && !inline {
            errors.push("did or recipientKeys with serviceEndpoint was missing".to_string());
        }

        if self.did.is_some() && (has_keys || self.service_endpoint.is_some()) {
            errors.push("did can not be combined with inline keys".to_string());
        }

        errors
    }

    /// `to_url` appends the base64url encoded invitation as the `c_i` parameter
    pub fn to_url(&self, domain: &str) -> Result<String, MessageError> {
        let mut url =
            Url::parse(domain).map_err(|err| MessageError::InvitationError(err.to_string()))?;

        let json = self
            .to_json()
            .map_err(|err| MessageError::JSONError(err.to_string()))?;

        url.query_pairs_mut()
            .append_pair(INVITATION_PARAM, &URL_SAFE_NO_PAD.encode(json.as_bytes()));

        Ok(url.to_string())
    }

    /// `from_url` accepts the `c_i` parameter and the legacy `d_m` one
    pub fn from_url(invitation_url: &str) -> Result<Self, MessageError> {
        let url = Url::parse(invitation_url)
            .map_err(|err| MessageError::InvitationError(err.to_string()))?;

        let encoded = url
            .query_pairs()
            .find(|(name, _)| name == INVITATION_PARAM || name == LEGACY_INVITATION_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                MessageError::InvitationError(
                    "invitation url parameter c_i or d_m was missing".to_string(),
                )
            })?;

        let trimmed = encoded.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| URL_SAFE.decode(&encoded))
            .or_else(|_| STANDARD.decode(&encoded))
            .map_err(|err| MessageError::InvitationError(err.to_string()))?;

        let invitation: ConnectionInvitation =
            serde_json::from_slice(&bytes).map_err(|err| MessageError::JSONError(err.to_string()))?;

        let errors = invitation.validate();
        if !errors.is_empty() {
            return Err(MessageError::ValidationError(errors));
        }

        Ok(invitation)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectionPayload {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "DIDDoc", skip_serializing_if = "Option::is_none", default)]
    pub did_doc: Option<DidDoc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectionRequest {
    pub label: String,
    pub connection: ConnectionPayload,
}

impl ToJSON for ConnectionInvitation {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl MessageBody for ConnectionRequest {
    const TYPE: &'static str = REQUEST;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.label.is_empty() {
            errors.push("label was missing".to_string());
        }

        if self.connection.did.is_empty() {
            errors.push("connection.DID was missing".to_string());
        }

        if self.connection.did_doc.is_none() {
            errors.push("connection.DIDDoc was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectionResponse {
    #[serde(rename = "connection~sig")]
    pub connection_sig: SignatureDecorator,
}

impl MessageBody for ConnectionResponse {
    const TYPE: &'static str = RESPONSE;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct TrustPing {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(default = "default_response_requested")]
    pub response_requested: bool,
}

fn default_response_requested() -> bool {
    true
}

impl MessageBody for TrustPing {
    const TYPE: &'static str = TRUST_PING;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct TrustPingResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
}

impl MessageBody for TrustPingResponse {
    const TYPE: &'static str = TRUST_PING_RESPONSE;
}

/// `ConnectionMessage` is every inbound message of the connection and trust ping protocols
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionMessage {
    Request(ConnectionRequest),
    Response(ConnectionResponse),
    TrustPing(TrustPing),
    TrustPingResponse(TrustPingResponse),
    Ack(Ack),
    ProblemReport(ProblemReport),
}

impl ConnectionMessage {
    pub fn decode(message: &AgentMessage) -> Result<Self, MessageError> {
        let message_type = message.message_type()?;
        let decoded = match (message_type.protocol_name(), message_type.message_name()) {
            ("connections", "request") => ConnectionMessage::Request(message.decode()?),
            ("connections", "response") => ConnectionMessage::Response(message.decode()?),
            ("connections", "problem_report") => {
                ConnectionMessage::ProblemReport(message.decode()?)
            }
            ("trust_ping", "ping") => ConnectionMessage::TrustPing(message.decode()?),
            ("trust_ping", "ping_response") => {
                ConnectionMessage::TrustPingResponse(message.decode()?)
            }
            ("notification", "ack") => ConnectionMessage::Ack(message.decode()?),
            _ => return Err(MessageError::InvalidMessageType(message.get_type())),
        };

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_invitation() -> ConnectionInvitation {
        ConnectionInvitation::new(
            "faber".to_string(),
            vec!["faber-key".to_string()],
            "https://faber.example/didcomm".to_string(),
            vec!["mediator-key".to_string()],
        )
    }

    #[test]
    fn test_invitation_url_round_trip() {
        let invitation = build_invitation();
        let url = invitation.to_url("https://example.com/ssi").unwrap();
        assert!(url.starts_with("https://example.com/ssi?c_i="));

        let decoded = ConnectionInvitation::from_url(&url).unwrap();
        assert_eq!(decoded, invitation);
    }

    #[test]
    fn test_invitation_url_legacy_param() {
        let invitation = build_invitation();
        let json = serde_json::to_vec(&invitation).unwrap();
        let url = format!("https://example.com?d_m={}", URL_SAFE.encode(json));

        let decoded = ConnectionInvitation::from_url(&url);
        assert!(!decoded.is_err());
        assert_eq!(decoded.unwrap().invitation_key(), Some("faber-key".to_string()));
    }

    #[test]
    fn test_invitation_url_missing_param() {
        let decoded = ConnectionInvitation::from_url("https://example.com/ssi?oob=abc");
        assert!(matches!(
            decoded.unwrap_err(),
            MessageError::InvitationError(_)
        ))
    }

    #[test]
    fn test_invitation_validation() {
        let mut invitation = build_invitation();
        invitation.service_endpoint = None;
        assert_eq!(invitation.validate().len(), 1);

        invitation.did = Some("did:sov:faber".to_string());
        invitation.recipient_keys = None;
        invitation.routing_keys = None;
        assert!(invitation.validate().is_empty());
    }

    #[test]
    fn test_decode_connection_message() {
        let ping = AgentMessage::new(&TrustPing {
            comment: None,
            response_requested: true,
        })
        .unwrap();

        let decoded = ConnectionMessage::decode(&ping).unwrap();
        assert!(matches!(decoded, ConnectionMessage::TrustPing(_)));

        let request = AgentMessage::from_body(
            REQUEST,
            &serde_json::json!({"label": "alice", "connection": {"DID": "did:prople:alice"}}),
        )
        .unwrap();

        let invalid = ConnectionMessage::decode(&request);
        assert!(matches!(
            invalid.unwrap_err(),
            MessageError::ValidationError(_)
        ))
    }
}
