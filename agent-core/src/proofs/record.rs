use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::agent::AutoAccept;
use crate::messaging::{AgentMessage, MessageError, ServiceDecorator};
use crate::storage::{Record, TagValue, Tags};
use crate::wallet::anoncreds::ProofRequest;

use super::messages::{ProposePresentation, RequestPresentation};
use super::types::{ProofError, ProofState};

/// `ProofRecord` is one present-proof thread, seen from either the prover or the verifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProofRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub connection_id: Option<String>,
    pub thread_id: String,
    pub state: ProofState,
    pub is_verified: Option<bool>,
    pub proposal_message: Option<AgentMessage>,
    pub request_message: Option<AgentMessage>,
    pub presentation_message: Option<AgentMessage>,
    pub auto_accept_proof: Option<AutoAccept>,
    pub our_service: Option<ServiceDecorator>,
    pub their_service: Option<ServiceDecorator>,
    pub error_message: Option<String>,

    #[serde(default)]
    version: u64,
}

impl ProofRecord {
    pub fn new(connection_id: Option<String>, thread_id: String, state: ProofState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            connection_id,
            thread_id,
            state,
            is_verified: None,
            proposal_message: None,
            request_message: None,
            presentation_message: None,
            auto_accept_proof: None,
            our_service: None,
            their_service: None,
            error_message: None,
            version: 0,
        }
    }

    pub fn assert_state(&self, expected: &[ProofState]) -> Result<(), ProofError> {
        if expected.contains(&self.state) {
            return Ok(());
        }

        Err(ProofError::InvalidState {
            id: self.id.to_owned(),
            expected: expected.to_vec(),
            actual: self.state,
        })
    }

    pub fn proposal(&self) -> Result<Option<ProposePresentation>, MessageError> {
        self.proposal_message
            .as_ref()
            .map(|message| message.decode())
            .transpose()
    }

    pub fn request(&self) -> Result<Option<RequestPresentation>, MessageError> {
        self.request_message
            .as_ref()
            .map(|message| message.decode())
            .transpose()
    }

    pub fn proof_request(&self) -> Result<ProofRequest, ProofError> {
        let request = self.request()?.ok_or_else(|| {
            ProofError::ValidationError(format!(
                "proof exchange {}: request_message was missing",
                self.id
            ))
        })?;

        Ok(request.indy_proof_request()?)
    }
}

impl Record for ProofRecord {
    fn record_type() -> &'static str {
        "ProofRecord"
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

    #[test]
    fn test_assert_state() {
        let record = ProofRecord::new(None, "thread-1".to_string(), ProofState::RequestSent);

        assert!(!record.assert_state(&[ProofState::RequestSent]).is_err());
        assert!(matches!(
            record.assert_state(&[ProofState::Done]).unwrap_err(),
            ProofError::InvalidState {
                actual: ProofState::RequestSent,
                ..
            }
        ))
    }

    #[test]
    fn test_missing_request() {
        let record = ProofRecord::new(
            Some("conn-1".to_string()),
            "thread-1".to_string(),
            ProofState::ProposalReceived,
        );

        assert!(matches!(
            record.proof_request().unwrap_err(),
            ProofError::ValidationError(_)
        ));

        let tags = record.get_tags();
        assert_eq!(tags.get("state"), Some(&TagValue::from("proposal-received")));
        assert_eq!(tags.get("connectionId"), Some(&TagValue::from("conn-1")));
    }
}
