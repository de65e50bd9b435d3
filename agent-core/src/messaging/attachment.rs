use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};

use super::types::MessageError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base64: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub json: Option<Value>,
}

/// `Attachment` is an embedded payload such as an offer, a request or a proof
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "mime-type", skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,

    pub data: AttachmentData,
}

impl Attachment {
    /// `from_json` builds a base64 encoded `application/json` attachment
    pub fn from_json<T: Serialize>(id: &str, payload: &T) -> Result<Self, MessageError> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|err| MessageError::AttachmentError(err.to_string()))?;

        Ok(Self {
            id: id.to_string(),
            mime_type: Some("application/json".to_string()),
            data: AttachmentData {
                base64: Some(STANDARD.encode(bytes)),
                json: None,
            },
        })
    }

    /// `decode_json` reads either the `base64` or the inline `json` data
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        if let Some(encoded) = &self.data.base64 {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|err| MessageError::AttachmentError(err.to_string()))?;

            return serde_json::from_slice(&bytes)
                .map_err(|err| MessageError::AttachmentError(err.to_string()));
        }

        match &self.data.json {
            Some(json) => serde_json::from_value(json.to_owned())
                .map_err(|err| MessageError::AttachmentError(err.to_string())),
            None => Err(MessageError::AttachmentError(format!(
                "attachment {} has no data",
                self.id
            ))),
        }
    }
}
