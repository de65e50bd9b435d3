use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::storage::{Record, TagValue, Tags};

use super::types::{MediationRole, MediationState, RoutingError};

/// `MediationRecord` tracks one recipient and mediator relationship, it is kept by both
/// sides with their own role
///
/// `recipient_keys` is the keylist registered at the mediator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct MediationRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: MediationState,
    pub role: MediationRole,
    pub connection_id: String,
    pub thread_id: String,
    pub endpoint: Option<String>,
    pub routing_keys: Vec<String>,
    pub recipient_keys: Vec<String>,
    pub is_default: bool,
    pub error_message: Option<String>,

    #[serde(default)]
    version: u64,
}

impl MediationRecord {
    pub fn new(
        role: MediationRole,
        state: MediationState,
        connection_id: String,
        thread_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            state,
            role,
            connection_id,
            thread_id,
            endpoint: None,
            routing_keys: Vec::new(),
            recipient_keys: Vec::new(),
            is_default: false,
            error_message: None,
            version: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == MediationState::Granted
    }

    pub fn assert_state(&self, expected: &[MediationState]) -> Result<(), RoutingError> {
        if expected.contains(&self.state) {
            return Ok(());
        }

        Err(RoutingError::InvalidState {
            id: self.id.to_owned(),
            expected: expected.to_vec(),
            actual: self.state,
        })
    }

    pub fn assert_role(&self, expected: MediationRole) -> Result<(), RoutingError> {
        if self.role == expected {
            return Ok(());
        }

        Err(RoutingError::InvalidRole {
            id: self.id.to_owned(),
            expected,
            actual: self.role,
        })
    }

    /// `add_recipient_key` returns false when the key was already registered
    pub fn add_recipient_key(&mut self, key: &str) -> bool {
        if self.recipient_keys.iter().any(|current| current == key) {
            return false;
        }

        self.recipient_keys.push(key.to_string());
        true
    }

    /// `remove_recipient_key` returns false when the key was not registered
    pub fn remove_recipient_key(&mut self, key: &str) -> bool {
        let before = self.recipient_keys.len();
        self.recipient_keys.retain(|current| current != key);
        before != self.recipient_keys.len()
    }
}

impl Record for MediationRecord {
    fn record_type() -> &'static str {
        "MediationRecord"
    }

    fn get_id(&self) -> String {
        self.id.to_owned()
    }

    fn get_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("state".to_string(), TagValue::from(self.state.to_string()));
        tags.insert("role".to_string(), TagValue::from(self.role.to_string()));
        tags.insert(
            "connectionId".to_string(),
            TagValue::from(self.connection_id.to_owned()),
        );
        tags.insert(
            "threadId".to_string(),
            TagValue::from(self.thread_id.to_owned()),
        );
        tags.insert(
            "recipientKeys".to_string(),
            TagValue::from(self.recipient_keys.clone()),
        );
        tags.insert(
            "default".to_string(),
            TagValue::from(self.is_default.to_string()),
        );
        tags
    }

    fn get_version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version
    }
}

pub const MEDIATOR_ROUTING_RECORD_ID: &str = "MEDIATOR_ROUTING_RECORD";

/// `MediatorRoutingRecord` keeps the routing keys a mediator hands out in every grant
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct MediatorRoutingRecord {
    pub id: String,
    pub routing_keys: Vec<String>,

    #[serde(default)]
    version: u64,
}

impl MediatorRoutingRecord {
    pub fn new(routing_keys: Vec<String>) -> Self {
        Self {
            id: MEDIATOR_ROUTING_RECORD_ID.to_string(),
            routing_keys,
            version: 0,
        }
    }
}

impl Record for MediatorRoutingRecord {
    fn record_type() -> &'static str {
        "MediatorRoutingRecord"
    }

    fn get_id(&self) -> String {
        self.id.to_owned()
    }

    fn get_tags(&self) -> Tags {
        Tags::new()
    }

    fn get_version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::Query;

    fn build_record() -> MediationRecord {
        MediationRecord::new(
            MediationRole::Mediator,
            MediationState::Granted,
            "conn-1".to_string(),
            "thread-1".to_string(),
        )
    }

    #[test]
    fn test_keylist_changes() {
        let mut record = build_record();
        assert!(record.add_recipient_key("key-1"));
        assert!(!record.add_recipient_key("key-1"));
        assert_eq!(record.recipient_keys, vec!["key-1".to_string()]);

        assert!(record.remove_recipient_key("key-1"));
        assert!(!record.remove_recipient_key("key-1"));
        assert!(record.recipient_keys.is_empty());
    }

    #[test]
    fn test_recipient_keys_tag_lookup() {
        let mut record = build_record();
        record.add_recipient_key("key-1");
        record.add_recipient_key("key-2");

        let tags = record.get_tags();
        assert!(Query::new().with("recipientKeys", "key-2").matches(&tags));
        assert!(!Query::new().with("recipientKeys", "key-3").matches(&tags));
        assert!(Query::new().with("default", "false").matches(&tags));
    }

    #[test]
    fn test_assert_state() {
        let record = build_record();
        let invalid = record.assert_state(&[MediationState::Requested]);
        assert!(matches!(
            invalid.unwrap_err(),
            RoutingError::InvalidState {
                actual: MediationState::Granted,
                ..
            }
        ));
    }
}
