use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::storage::{Record, TagValue, Tags};

use super::did_doc::{DidCommService, DidDoc};
use super::messages::ConnectionInvitation;
use super::types::{ConnectionError, ConnectionRole, ConnectionState};

/// `ConnectionRecord` is the persisted state of one pairwise channel
///
/// `did`/`verkey` are our keys for this relationship, `their_*` fields are learned from
/// the peer request or response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: ConnectionState,
    pub role: ConnectionRole,
    pub did: String,
    pub verkey: String,
    pub did_doc: DidDoc,
    pub their_did: Option<String>,
    pub their_did_doc: Option<DidDoc>,
    pub their_label: Option<String>,
    pub invitation: Option<ConnectionInvitation>,
    pub alias: Option<String>,
    pub auto_accept: Option<bool>,
    pub multi_use_invitation: bool,
    pub thread_id: Option<String>,
    pub mediator_id: Option<String>,
    pub error_message: Option<String>,

    #[serde(default)]
    version: u64,
}

impl ConnectionRecord {
    pub fn new(
        role: ConnectionRole,
        state: ConnectionState,
        did: String,
        verkey: String,
        did_doc: DidDoc,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            state,
            role,
            did,
            verkey,
            did_doc,
            their_did: None,
            their_did_doc: None,
            their_label: None,
            invitation: None,
            alias: None,
            auto_accept: None,
            multi_use_invitation: false,
            thread_id: None,
            mediator_id: None,
            error_message: None,
            version: 0,
        }
    }

    pub fn their_key(&self) -> Option<String> {
        self.their_did_doc
            .as_ref()
            .and_then(|doc| doc.first_recipient_key())
    }

    pub fn invitation_key(&self) -> Option<String> {
        self.invitation
            .as_ref()
            .and_then(|invitation| invitation.invitation_key())
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Responded | ConnectionState::Completed
        )
    }

    pub fn assert_state(&self, expected: &[ConnectionState]) -> Result<(), ConnectionError> {
        if expected.contains(&self.state) {
            return Ok(());
        }

        Err(ConnectionError::InvalidState {
            id: self.id.to_owned(),
            expected: expected.to_vec(),
            actual: self.state,
        })
    }

    pub fn assert_role(&self, expected: ConnectionRole) -> Result<(), ConnectionError> {
        if self.role == expected {
            return Ok(());
        }

        Err(ConnectionError::InvalidRole {
            id: self.id.to_owned(),
            expected,
            actual: self.role,
        })
    }

    /// `their_services` falls back to the invitation until the peer sent its DID document
    pub fn their_services(&self) -> Vec<DidCommService> {
        if let Some(doc) = &self.their_did_doc {
            return doc.didcomm_services();
        }

        let invitation = match &self.invitation {
            Some(invitation) if self.role == ConnectionRole::Invitee => invitation,
            _ => return Vec::new(),
        };

        match (&invitation.recipient_keys, &invitation.service_endpoint) {
            (Some(keys), Some(endpoint)) => vec![DidCommService {
                id: "#IndyAgentService".to_string(),
                service_type: "IndyAgent".to_string(),
                priority: 0,
                recipient_keys: keys.to_owned(),
                routing_keys: invitation.routing_keys.clone().unwrap_or_default(),
                service_endpoint: endpoint.to_owned(),
            }],
            _ => Vec::new(),
        }
    }
}

impl Record for ConnectionRecord {
    fn record_type() -> &'static str {
        "ConnectionRecord"
    }

    fn get_id(&self) -> String {
        self.id.to_owned()
    }

    fn get_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("state".to_string(), TagValue::from(self.state.to_string()));
        tags.insert("role".to_string(), TagValue::from(self.role.to_string()));
        tags.insert("verkey".to_string(), TagValue::from(self.verkey.to_owned()));
        tags.insert("did".to_string(), TagValue::from(self.did.to_owned()));

        let optional = [
            ("threadId", self.thread_id.to_owned()),
            ("theirDid", self.their_did.to_owned()),
            ("theirKey", self.their_key()),
            ("invitationKey", self.invitation_key()),
            ("mediatorId", self.mediator_id.to_owned()),
        ];

        for (name, value) in optional {
            if let Some(val) = value {
                tags.insert(name.to_string(), TagValue::from(val));
            }
        }

        tags
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

    fn build_record(role: ConnectionRole) -> ConnectionRecord {
        let doc = DidDoc::build("did:prople:alice", "alice-key", &["memory://alice".to_string()], &[]);
        ConnectionRecord::new(
            role,
            ConnectionState::Invited,
            "did:prople:alice".to_string(),
            "alice-key".to_string(),
            doc,
        )
    }

    #[test]
    fn test_assert_state() {
        let record = build_record(ConnectionRole::Inviter);
        assert!(!record.assert_state(&[ConnectionState::Invited]).is_err());

        let invalid = record.assert_state(&[ConnectionState::Requested]);
        assert!(matches!(
            invalid.unwrap_err(),
            ConnectionError::InvalidState {
                actual: ConnectionState::Invited,
                ..
            }
        ))
    }

    #[test]
    fn test_invitee_services_from_invitation() {
        let mut record = build_record(ConnectionRole::Invitee);
        record.invitation = Some(ConnectionInvitation::new(
            "faber".to_string(),
            vec!["faber-key".to_string()],
            "memory://faber".to_string(),
            vec![],
        ));

        let services = record.their_services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].recipient_keys, vec!["faber-key".to_string()]);

        let tags = record.get_tags();
        assert_eq!(tags.get("invitationKey"), Some(&TagValue::from("faber-key")));
        assert_eq!(tags.get("state"), Some(&TagValue::from("invited")));
        assert!(tags.get("theirKey").is_none());
    }
}
