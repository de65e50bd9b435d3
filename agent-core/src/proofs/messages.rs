use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::{
    AckStatus, AgentMessage, Attachment, MessageBody, MessageError, ProblemReport,
};
use crate::wallet::anoncreds::{IndyProof, ProofRequest};

use super::preview::PresentationPreview;

pub const PROPOSE_PRESENTATION: &str = "https://didcomm.org/present-proof/1.0/propose-presentation";
pub const REQUEST_PRESENTATION: &str = "https://didcomm.org/present-proof/1.0/request-presentation";
pub const PRESENTATION: &str = "https://didcomm.org/present-proof/1.0/presentation";
pub const PRESENTATION_ACK: &str = "https://didcomm.org/present-proof/1.0/ack";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/present-proof/1.0/problem-report";

pub const INDY_PROOF_REQUEST_ATTACHMENT_ID: &str = "libindy-request-presentation-0";
pub const INDY_PROOF_ATTACHMENT_ID: &str = "libindy-presentation-0";

fn find_attachment<'a>(
    attachments: &'a [Attachment],
    id: &str,
) -> Result<&'a Attachment, MessageError> {
    attachments
        .iter()
        .find(|attachment| attachment.id == id)
        .ok_or_else(|| MessageError::AttachmentError(format!("attachment {} was missing", id)))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProposePresentation {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    pub presentation_proposal: PresentationPreview,
}

impl MessageBody for ProposePresentation {
    const TYPE: &'static str = PROPOSE_PRESENTATION;

    fn validate(&self) -> Vec<String> {
        self.presentation_proposal.validate()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RequestPresentation {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(rename = "request_presentations~attach")]
    pub request_presentations_attach: Vec<Attachment>,
}

impl RequestPresentation {
    pub fn new(proof_request: &ProofRequest, comment: Option<String>) -> Result<Self, MessageError> {
        Ok(Self {
            comment,
            request_presentations_attach: vec![Attachment::from_json(
                INDY_PROOF_REQUEST_ATTACHMENT_ID,
                proof_request,
            )?],
        })
    }

    pub fn indy_proof_request(&self) -> Result<ProofRequest, MessageError> {
        find_attachment(
            &self.request_presentations_attach,
            INDY_PROOF_REQUEST_ATTACHMENT_ID,
        )?
        .decode_json()
    }
}

impl MessageBody for RequestPresentation {
    const TYPE: &'static str = REQUEST_PRESENTATION;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.request_presentations_attach.is_empty() {
            errors.push("request_presentations~attach was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Presentation {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(rename = "presentations~attach")]
    pub presentations_attach: Vec<Attachment>,
}

impl Presentation {
    pub fn new(proof: &IndyProof, comment: Option<String>) -> Result<Self, MessageError> {
        Ok(Self {
            comment,
            presentations_attach: vec![Attachment::from_json(INDY_PROOF_ATTACHMENT_ID, proof)?],
        })
    }

    pub fn indy_proof(&self) -> Result<IndyProof, MessageError> {
        find_attachment(&self.presentations_attach, INDY_PROOF_ATTACHMENT_ID)?.decode_json()
    }
}

impl MessageBody for Presentation {
    const TYPE: &'static str = PRESENTATION;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.presentations_attach.is_empty() {
            errors.push("presentations~attach was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PresentationAck {
    pub status: AckStatus,
}

impl PresentationAck {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
        }
    }
}

impl MessageBody for PresentationAck {
    const TYPE: &'static str = PRESENTATION_ACK;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProofMessage {
    Proposal(ProposePresentation),
    Request(RequestPresentation),
    Presentation(Presentation),
    Ack(PresentationAck),
    ProblemReport(ProblemReport),
}

impl ProofMessage {
    pub fn decode(message: &AgentMessage) -> Result<Self, MessageError> {
        let message_type = message.message_type()?;
        if message_type.protocol_name() != "present-proof" {
            return Err(MessageError::InvalidMessageType(message.get_type()));
        }

        let decoded = match message_type.message_name() {
            "propose-presentation" => ProofMessage::Proposal(message.decode()?),
            "request-presentation" => ProofMessage::Request(message.decode()?),
            "presentation" => ProofMessage::Presentation(message.decode()?),
            "ack" => ProofMessage::Ack(message.decode()?),
            "problem-report" => ProofMessage::ProblemReport(message.decode()?),
            _ => return Err(MessageError::InvalidMessageType(message.get_type())),
        };

        Ok(decoded)
    }
}
