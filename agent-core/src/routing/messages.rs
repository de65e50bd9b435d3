use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::messaging::{AgentMessage, MessageBody, MessageError, ProblemReport};
use crate::wallet::EncryptedMessage;

pub const FORWARD: &str = "https://didcomm.org/routing/1.0/forward";

pub const MEDIATE_REQUEST: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-request";
pub const MEDIATE_GRANT: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-grant";
pub const MEDIATE_DENY: &str = "https://didcomm.org/coordinate-mediation/1.0/mediate-deny";
pub const KEYLIST_UPDATE: &str = "https://didcomm.org/coordinate-mediation/1.0/keylist-update";
pub const KEYLIST_UPDATE_RESPONSE: &str =
    "https://didcomm.org/coordinate-mediation/1.0/keylist-update-response";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/coordinate-mediation/1.0/problem-report";

pub const BATCH_PICKUP: &str = "https://didcomm.org/messagepickup/1.0/batch-pickup";
pub const BATCH: &str = "https://didcomm.org/messagepickup/1.0/batch";
pub const STATUS_REQUEST: &str = "https://didcomm.org/messagepickup/1.0/status-request";
pub const STATUS: &str = "https://didcomm.org/messagepickup/1.0/status";

/// `Forward` wraps an envelope for the next hop, `to` is the key the inner envelope is
/// encrypted for
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Forward {
    pub to: String,
    pub msg: EncryptedMessage,
}

impl MessageBody for Forward {
    const TYPE: &'static str = FORWARD;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.to.is_empty() {
            errors.push("to was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct MediationRequest {}

impl MessageBody for MediationRequest {
    const TYPE: &'static str = MEDIATE_REQUEST;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct MediationGrant {
    pub endpoint: String,
    pub routing_keys: Vec<String>,
}

impl MessageBody for MediationGrant {
    const TYPE: &'static str = MEDIATE_GRANT;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.endpoint.is_empty() {
            errors.push("endpoint was missing".to_string());
        }

        if self.routing_keys.is_empty() {
            errors.push("routing_keys was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct MediationDeny {}

impl MessageBody for MediationDeny {
    const TYPE: &'static str = MEDIATE_DENY;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum KeylistUpdateAction {
    Add,
    Remove,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "snake_case")]
pub enum KeylistUpdateResult {
    ClientError,
    ServerError,
    NoChange,
    Success,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct KeylistUpdateItem {
    pub recipient_key: String,
    pub action: KeylistUpdateAction,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct KeylistUpdate {
    pub updates: Vec<KeylistUpdateItem>,
}

impl MessageBody for KeylistUpdate {
    const TYPE: &'static str = KEYLIST_UPDATE;

    fn validate(&self) -> Vec<String> {
        self.updates
            .iter()
            .enumerate()
            .filter(|(_, update)| update.recipient_key.is_empty())
            .map(|(index, _)| format!("updates[{}].recipient_key was missing", index))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct KeylistUpdated {
    pub recipient_key: String,
    pub action: KeylistUpdateAction,
    pub result: KeylistUpdateResult,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct KeylistUpdateResponse {
    pub updated: Vec<KeylistUpdated>,
}

impl MessageBody for KeylistUpdateResponse {
    const TYPE: &'static str = KEYLIST_UPDATE_RESPONSE;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct BatchPickup {
    pub batch_size: usize,
}

impl MessageBody for BatchPickup {
    const TYPE: &'static str = BATCH_PICKUP;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.batch_size == 0 {
            errors.push("batch_size was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct BatchItem {
    pub id: String,
    pub message: EncryptedMessage,
}

impl BatchItem {
    pub fn new(message: EncryptedMessage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Batch {
    #[serde(rename = "messages~attach")]
    pub messages: Vec<BatchItem>,
}

impl MessageBody for Batch {
    const TYPE: &'static str = BATCH;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct StatusRequest {}

impl MessageBody for StatusRequest {
    const TYPE: &'static str = STATUS_REQUEST;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Status {
    pub message_count: usize,
}

impl MessageBody for Status {
    const TYPE: &'static str = STATUS;
}

/// `RoutingMessage` is every inbound message of the routing, coordinate-mediation and
/// messagepickup protocols
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingMessage {
    Forward(Forward),
    MediationRequest(MediationRequest),
    MediationGrant(MediationGrant),
    MediationDeny(MediationDeny),
    KeylistUpdate(KeylistUpdate),
    KeylistUpdateResponse(KeylistUpdateResponse),
    BatchPickup(BatchPickup),
    Batch(Batch),
    StatusRequest(StatusRequest),
    Status(Status),
    ProblemReport(ProblemReport),
}

impl RoutingMessage {
    pub fn decode(message: &AgentMessage) -> Result<Self, MessageError> {
        let message_type = message.message_type()?;
        let decoded = match (message_type.protocol_name(), message_type.message_name()) {
            ("routing", "forward") => RoutingMessage::Forward(message.decode()?),
            ("coordinate-mediation", "mediate-request") => {
                RoutingMessage::MediationRequest(message.decode()?)
            }
            ("coordinate-mediation", "mediate-grant") => {
                RoutingMessage::MediationGrant(message.decode()?)
            }
            ("coordinate-mediation", "mediate-deny") => {
                RoutingMessage::MediationDeny(message.decode()?)
            }
            ("coordinate-mediation", "keylist-update") => {
                RoutingMessage::KeylistUpdate(message.decode()?)
            }
            ("coordinate-mediation", "keylist-update-response") => {
                RoutingMessage::KeylistUpdateResponse(message.decode()?)
            }
            ("coordinate-mediation", "problem-report") => {
                RoutingMessage::ProblemReport(message.decode()?)
            }
            ("messagepickup", "batch-pickup") => RoutingMessage::BatchPickup(message.decode()?),
            ("messagepickup", "batch") => RoutingMessage::Batch(message.decode()?),
            ("messagepickup", "status-request") => {
                RoutingMessage::StatusRequest(message.decode()?)
            }
            ("messagepickup", "status") => RoutingMessage::Status(message.decode()?),
            _ => return Err(MessageError::InvalidMessageType(message.get_type())),
        };

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;

    #[test]
    fn test_decode_forward() {
        let message = AgentMessage::from_value(json!({
            "@id": "forward-1",
            "@type": "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/routing/1.0/forward",
            "to": "recipient-key",
            "msg": {
                "protected": "p",
                "iv": "i",
                "ciphertext": "c",
                "tag": "t"
            }
        }))
        .unwrap();

        let decoded = RoutingMessage::decode(&message);
        assert!(!decoded.is_err());
        assert!(matches!(
            decoded.unwrap(),
            RoutingMessage::Forward(Forward { to, .. }) if to == "recipient-key"
        ));
    }

    #[test]
    fn test_decode_grant_validation() {
        let message = AgentMessage::new(&MediationGrant {
            endpoint: "".to_string(),
            routing_keys: vec![],
        })
        .unwrap();

        let decoded = RoutingMessage::decode(&message);
        assert!(matches!(
            decoded.unwrap_err(),
            MessageError::ValidationError(errors) if errors.len() == 2
        ));
    }

    #[test]
    fn test_keylist_update_wire_format() {
        let message = AgentMessage::new(&KeylistUpdate {
            updates: vec![KeylistUpdateItem {
                recipient_key: "key-1".to_string(),
                action: KeylistUpdateAction::Add,
            }],
        })
        .unwrap();

        let value = message.to_value().unwrap();
        assert_eq!(value["updates"][0]["action"], json!("add"));
        assert_eq!(value["updates"][0]["recipient_key"], json!("key-1"));
    }

    #[test]
    fn test_decode_unknown_message() {
        let message = AgentMessage::from_value(json!({
            "@id": "1",
            "@type": "https://didcomm.org/messagepickup/1.0/noop"
        }))
        .unwrap();

        assert!(matches!(
            RoutingMessage::decode(&message).unwrap_err(),
            MessageError::InvalidMessageType(_)
        ));
    }
}
