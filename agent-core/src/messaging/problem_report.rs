use rst_common::standard::serde::{self, Deserialize, Serialize};

use super::message::MessageBody;

pub const NOTIFICATION_PROBLEM_REPORT: &str = "https://didcomm.org/notification/1.0/problem-report";
pub const NOTIFICATION_ACK: &str = "https://didcomm.org/notification/1.0/ack";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProblemDescription {
    pub code: String,
    pub en: String,
}

/// `ProblemReport` is the body shared by every protocol specific `problem-report`
///
/// Protocols build it with their own `@type` through [`super::AgentMessage::from_body`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProblemReport {
    pub description: ProblemDescription,
}

impl ProblemReport {
    pub fn new(code: &str, en: &str) -> Self {
        Self {
            description: ProblemDescription {
                code: code.to_string(),
                en: en.to_string(),
            },
        }
    }

    /// `error_message` is the form stored on the exchange record
    pub fn error_message(&self) -> String {
        format!("{}: {}", self.description.code, self.description.en)
    }
}

impl MessageBody for ProblemReport {
    const TYPE: &'static str = NOTIFICATION_PROBLEM_REPORT;

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.description.code.is_empty() {
            errors.push("description.code was missing".to_string());
        }

        errors
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
pub enum AckStatus {
    #[serde(rename = "OK")]
    Ok,

    #[serde(rename = "FAIL")]
    Fail,

    #[serde(rename = "PENDING")]
    Pending,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Ack {
    pub status: AckStatus,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
        }
    }
}

impl MessageBody for Ack {
    const TYPE: &'static str = NOTIFICATION_ACK;
}
