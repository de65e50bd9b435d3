use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::{
    AckStatus, AgentMessage, Attachment, MessageBody, MessageError, ProblemReport,
};
use crate::wallet::anoncreds::{CredentialOffer, CredentialRequest, IndyCredential};

use super::preview::CredentialPreview;

pub const PROPOSE_CREDENTIAL: &str = "https://didcomm.org/issue-credential/1.0/propose-credential";
pub const OFFER_CREDENTIAL: &str = "https://didcomm.org/issue-credential/1.0/offer-credential";
pub const REQUEST_CREDENTIAL: &str = "https://didcomm.org/issue-credential/1.0/request-credential";
pub const ISSUE_CREDENTIAL: &str = "https://didcomm.org/issue-credential/1.0/issue-credential";
pub const CREDENTIAL_ACK: &str = "https://didcomm.org/issue-credential/1.0/ack";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/issue-credential/1.0/problem-report";

pub const INDY_CREDENTIAL_OFFER_ATTACHMENT_ID: &str = "libindy-cred-offer-0";
pub const INDY_CREDENTIAL_REQUEST_ATTACHMENT_ID: &str = "libindy-cred-request-0";
pub const INDY_CREDENTIAL_ATTACHMENT_ID: &str = "libindy-cred-0";

fn first_attachment<'a>(
    attachments: &'a [Attachment],
    id: &str,
) -> Result<&'a Attachment, MessageError> {
    attachments
        .iter()
        .find(|attachment| attachment.id == id)
        .or_else(|| attachments.first())
        .ok_or_else(|| MessageError::AttachmentError(format!("attachment {} was missing", id)))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct ProposeCredential {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credential_proposal: Option<CredentialPreview>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_issuer_did: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cred_def_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub issuer_did: Option<String>,
}

impl MessageBody for ProposeCredential {
    const TYPE: &'static str = PROPOSE_CREDENTIAL;

    fn validate(&self) -> Vec<String> {
        self.credential_proposal
            .as_ref()
            .map(|preview| preview.validate())
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct OfferCredential {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    pub credential_preview: CredentialPreview,

    #[serde(rename = "offers~attach")]
    pub offers_attach: Vec<Attachment>,
}

impl OfferCredential {
    pub fn new(
        preview: CredentialPreview,
        offer: &CredentialOffer,
        comment: Option<String>,
    ) -> Result<Self, MessageError> {
        Ok(Self {
            comment,
            credential_preview: preview,
            offers_attach: vec![Attachment::from_json(
                INDY_CREDENTIAL_OFFER_ATTACHMENT_ID,
                offer,
            )?],
        })
    }

    pub fn indy_offer(&self) -> Result<CredentialOffer, MessageError> {
        first_attachment(&self.offers_attach, INDY_CREDENTIAL_OFFER_ATTACHMENT_ID)?.decode_json()
    }
}

impl MessageBody for OfferCredential {
    const TYPE: &'static str = OFFER_CREDENTIAL;

    fn validate(&self) -> Vec<String> {
        let mut errors = self.credential_preview.validate();
        if self.offers_attach.is_empty() {
            errors.push("offers~attach was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RequestCredential {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(rename = "requests~attach")]
    pub requests_attach: Vec<Attachment>,
}

impl RequestCredential {
    pub fn new(request: &CredentialRequest, comment: Option<String>) -> Result<Self, MessageError> {
        Ok(Self {
            comment,
            requests_attach: vec![Attachment::from_json(
                INDY_CREDENTIAL_REQUEST_ATTACHMENT_ID,
                request,
            )?],
        })
    }

    pub fn indy_request(&self) -> Result<CredentialRequest, MessageError> {
        first_attachment(&self.requests_attach, INDY_CREDENTIAL_REQUEST_ATTACHMENT_ID)?
            .decode_json()
    }
}

impl MessageBody for RequestCredential {
    const TYPE: &'static str = REQUEST_CREDENTIAL;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.requests_attach.is_empty() {
            errors.push("requests~attach was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct IssueCredential {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,

    #[serde(rename = "credentials~attach")]
    pub credentials_attach: Vec<Attachment>,
}

impl IssueCredential {
    pub fn new(credential: &IndyCredential, comment: Option<String>) -> Result<Self, MessageError> {
        Ok(Self {
            comment,
            credentials_attach: vec![Attachment::from_json(
                INDY_CREDENTIAL_ATTACHMENT_ID,
                credential,
            )?],
        })
    }

    pub fn indy_credential(&self) -> Result<IndyCredential, MessageError> {
        first_attachment(&self.credentials_attach, INDY_CREDENTIAL_ATTACHMENT_ID)?.decode_json()
    }
}

impl MessageBody for IssueCredential {
    const TYPE: &'static str = ISSUE_CREDENTIAL;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.credentials_attach.is_empty() {
            errors.push("credentials~attach was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialAck {
    pub status: AckStatus,
}

impl CredentialAck {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
        }
    }
}

impl MessageBody for CredentialAck {
    const TYPE: &'static str = CREDENTIAL_ACK;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialMessage {
    Proposal(ProposeCredential),
    Offer(OfferCredential),
    Request(RequestCredential),
    Credential(IssueCredential),
    Ack(CredentialAck),
    ProblemReport(ProblemReport),
}

impl CredentialMessage {
    pub fn decode(message: &AgentMessage) -> Result<Self, MessageError> {
        let message_type = message.message_type()?;
        if message_type.protocol_name() != "issue-credential" {
            return Err(MessageError::InvalidMessageType(message.get_type()));
        }

        let decoded = match message_type.message_name() {
            "propose-credential" => CredentialMessage::Proposal(message.decode()?),
            "offer-credential" => CredentialMessage::Offer(message.decode()?),
            "request-credential" => CredentialMessage::Request(message.decode()?),
            "issue-credential" => CredentialMessage::Credential(message.decode()?),
            "ack" => CredentialMessage::Ack(message.decode()?),
            "problem-report" => CredentialMessage::ProblemReport(message.decode()?),
            _ => return Err(MessageError::InvalidMessageType(message.get_type())),
        };

        Ok(decoded)
    }
}
