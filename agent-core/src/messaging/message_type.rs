use std::fmt;

use super::types::MessageError;

pub const DIDCOMM_DOC_URI: &str = "https://didcomm.org/";

const LEGACY_DOC_URI: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/";

/// `MessageType` is a parsed `@type` uri: `<doc-uri><protocol>/<major>.<minor>/<name>`
///
/// The legacy `did:sov` document uri is normalized to [`DIDCOMM_DOC_URI`] so both forms
/// resolve to the same handler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageType {
    document_uri: String,
    protocol_name: String,
    major: u32,
    minor: u32,
    message_name: String,
}

impl MessageType {
    pub fn parse(uri: &str) -> Result<Self, MessageError> {
        let normalized = match uri.strip_prefix(LEGACY_DOC_URI) {
            Some(rest) => format!("{}{}", DIDCOMM_DOC_URI, rest),
            None => uri.to_string(),
        };

        let invalid = || MessageError::InvalidMessageType(uri.to_string());

        let (rest, message_name) = normalized.rsplit_once('/').ok_or_else(invalid)?;
        let (rest, version) = rest.rsplit_once('/').ok_or_else(invalid)?;
        let (document, protocol_name) = rest.rsplit_once('/').ok_or_else(invalid)?;
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;

        if message_name.is_empty() || protocol_name.is_empty() || document.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            document_uri: format!("{}/", document),
            protocol_name: protocol_name.to_string(),
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
            message_name: message_name.to_string(),
        })
    }

    pub fn document_uri(&self) -> &str {
        &self.document_uri
    }

    pub fn protocol_name(&self) -> &str {
        &self.protocol_name
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn message_name(&self) -> &str {
        &self.message_name
    }

    pub fn protocol_uri(&self) -> String {
        format!(
            "{}{}/{}.{}",
            self.document_uri, self.protocol_name, self.major, self.minor
        )
    }

    /// `is_same_family` compares everything except the minor version
    pub fn is_same_family(&self, other: &MessageType) -> bool {
        self.document_uri == other.document_uri
            && self.protocol_name == other.protocol_name
            && self.major == other.major
            && self.message_name == other.message_name
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol_uri(), self.message_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    #[test]
    fn test_parse_message_types() {
        let table = vec![
            (
                "https://didcomm.org/connections/1.0/invitation",
                ("connections", 1, 0, "invitation"),
            ),
            (
                "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/issue-credential/1.0/offer-credential",
                ("issue-credential", 1, 0, "offer-credential"),
            ),
            (
                "https://didcomm.org/coordinate-mediation/1.3/mediate-grant",
                ("coordinate-mediation", 1, 3, "mediate-grant"),
            ),
        ];

        for (validator, input, expected) in table_test!(table) {
            let parsed = MessageType::parse(input);
            assert!(!parsed.is_err());

            let message_type = parsed.unwrap();
            validator
                .given(&format!("{}", input))
                .when("parse message type")
                .then("split protocol, version and name")
                .assert_eq(
                    expected,
                    (
                        message_type.protocol_name(),
                        message_type.major(),
                        message_type.minor(),
                        message_type.message_name(),
                    ),
                );
        }
    }

    #[test]
    fn test_legacy_prefix_normalized() {
        let legacy =
            MessageType::parse("did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/trust_ping/1.0/ping").unwrap();
        let current = MessageType::parse("https://didcomm.org/trust_ping/1.0/ping").unwrap();

        assert_eq!(legacy, current);
        assert_eq!(
            legacy.to_string(),
            "https://didcomm.org/trust_ping/1.0/ping".to_string()
        );
    }

    #[test]
    fn test_parse_invalid() {
        let invalids = [
            "",
            "invitation",
            "https://didcomm.org/connections/invitation",
            "https://didcomm.org/connections/a.b/invitation",
        ];

        for input in invalids {
            let parsed = MessageType::parse(input);
            assert!(matches!(
                parsed.unwrap_err(),
                MessageError::InvalidMessageType(_)
            ));
        }
    }

    #[test]
    fn test_same_family() {
        let first = MessageType::parse("https://didcomm.org/fake-protocol/1.1/message").unwrap();
        let second = MessageType::parse("https://didcomm.org/fake-protocol/1.5/message").unwrap();
        let other_major = MessageType::parse("https://didcomm.org/fake-protocol/2.0/message").unwrap();

        assert!(first.is_same_family(&second));
        assert!(!first.is_same_family(&other_major));
    }
}
