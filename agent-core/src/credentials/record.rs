use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::standard::uuid::Uuid;

use crate::agent::AutoAccept;
use crate::messaging::{AgentMessage, MessageError, ServiceDecorator};
use crate::storage::{Record, TagValue, Tags};

use super::messages::{OfferCredential, ProposeCredential};
use super::preview::CredentialPreviewAttribute;
use super::types::{CredentialError, CredentialState};

/// `CredentialExchangeRecord` is one issue-credential thread, seen from either side
///
/// The last message of each kind is kept so later steps can be checked against what was
/// proposed or offered. `our_service`/`their_service` are only set for connection-less
/// exchanges.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialExchangeRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub connection_id: Option<String>,
    pub thread_id: String,
    pub state: CredentialState,
    pub proposal_message: Option<AgentMessage>,
    pub offer_message: Option<AgentMessage>,
    pub request_message: Option<AgentMessage>,
    pub credential_message: Option<AgentMessage>,
    pub credential_attributes: Vec<CredentialPreviewAttribute>,
    pub auto_accept_credential: Option<AutoAccept>,
    pub request_metadata: Option<Value>,
    pub credential_id: Option<String>,
    pub our_service: Option<ServiceDecorator>,
    pub their_service: Option<ServiceDecorator>,
    pub error_message: Option<String>,

    #[serde(default)]
    version: u64,
}

impl CredentialExchangeRecord {
    pub fn new(connection_id: Option<String>, thread_id: String, state: CredentialState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            connection_id,
            thread_id,
            state,
            proposal_message: None,
            offer_message: None,
            request_message: None,
            credential_message: None,
            credential_attributes: Vec::new(),
            auto_accept_credential: None,
            request_metadata: None,
            credential_id: None,
            our_service: None,
            their_service: None,
            error_message: None,
            version: 0,
        }
    }

    pub fn assert_state(&self, expected: &[CredentialState]) -> Result<(), CredentialError> {
        if expected.contains(&self.state) {
            return Ok(());
        }

        Err(CredentialError::InvalidState {
            id: self.id.to_owned(),
            expected: expected.to_vec(),
            actual: self.state,
        })
    }

    pub fn proposal(&self) -> Result<Option<ProposeCredential>, MessageError> {
        self.proposal_message
            .as_ref()
            .map(|message| message.decode())
            .transpose()
    }

    pub fn offer(&self) -> Result<Option<OfferCredential>, MessageError> {
        self.offer_message
            .as_ref()
            .map(|message| message.decode())
            .transpose()
    }

    pub fn get_offer(&self) -> Result<OfferCredential, CredentialError> {
        self.offer()?.ok_or_else(|| {
            CredentialError::ValidationError(format!(
                "credential exchange {}: offer_message was missing",
                self.id
            ))
        })
    }
}

impl Record for CredentialExchangeRecord {
    fn record_type() -> &'static str {
        "CredentialRecord"
    }

    fn get_id(&self) -> String {
        self.id.to_owned()
    }

    fn get_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("threadId".to_string(), TagValue::from(self.thread_id.to_owned()));
        tags.insert("state".to_string(), TagValue::from(self.state.to_string()));

        if let Some(connection_id) = &self.connection_id {
            tags.insert(
                "connectionId".to_string(),
                TagValue::from(connection_id.to_owned()),
            );
        }

        if let Some(credential_id) = &self.credential_id {
            tags.insert(
                "credentialId".to_string(),
                TagValue::from(credential_id.to_owned()),
            );
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
