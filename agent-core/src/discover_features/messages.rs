use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::{AgentMessage, MessageBody, MessageError};

pub const QUERY: &str = "https://didcomm.org/discover-features/1.0/query";
pub const DISCLOSE: &str = "https://didcomm.org/discover-features/1.0/disclose";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct FeatureQuery {
    /// protocol uri, a trailing `*` matches every uri starting with the rest
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
}

impl FeatureQuery {
    /// `matches` compares the query against a protocol uri such as
    /// `https://didcomm.org/connections/1.0`
    pub fn matches(&self, protocol_uri: &str) -> bool {
        match self.query.strip_suffix('*') {
            Some(prefix) => protocol_uri.starts_with(prefix),
            None => protocol_uri == self.query,
        }
    }
}

impl MessageBody for FeatureQuery {
    const TYPE: &'static str = QUERY;

    fn validate(&self) -> Vec<String> {
        if self.query.trim().is_empty() {
            return vec!["query was missing".to_string()];
        }

        Vec::new()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[serde(crate = "self::serde")]
pub struct ProtocolDescriptor {
    pub pid: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct FeatureDisclose {
    pub protocols: Vec<ProtocolDescriptor>,
}

impl MessageBody for FeatureDisclose {
    const TYPE: &'static str = DISCLOSE;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMessage {
    Query(FeatureQuery),
    Disclose(FeatureDisclose),
}

impl FeatureMessage {
    pub fn decode(message: &AgentMessage) -> Result<Self, MessageError> {
        let message_type = message.message_type()?;
        let decoded = match (message_type.protocol_name(), message_type.message_name()) {
            ("discover-features", "query") => FeatureMessage::Query(message.decode()?),
            ("discover-features", "disclose") => FeatureMessage::Disclose(message.decode()?),
            _ => return Err(MessageError::InvalidMessageType(message.get_type())),
        };

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use table_test::table_test;

    #[test]
    fn test_query_matches() {
        let table = vec![
            (("*", "https://didcomm.org/connections/1.0"), true),
            (("https://didcomm.org/*", "https://didcomm.org/basicmessage/1.0"), true),
            (("https://didcomm.org/issue-credential/*", "https://didcomm.org/issue-credential/1.0"), true),
            (("https://didcomm.org/issue-credential/*", "https://didcomm.org/present-proof/1.0"), false),
            (("https://didcomm.org/connections/1.0", "https://didcomm.org/connections/1.0"), true),
            (("https://didcomm.org/connections/1.1", "https://didcomm.org/connections/1.0"), false),
        ];

        for (validator, (query, protocol), expected) in table_test!(table) {
            let feature_query = FeatureQuery {
                query: query.to_string(),
                comment: None,
            };

            validator
                .given(&format!("query {} and protocol {}", query, protocol))
                .when("matches")
                .then(&format!("it should be {}", expected))
                .assert_eq(expected, feature_query.matches(protocol));
        }
    }

    #[test]
    fn test_empty_query_rejected() {
        let query = FeatureQuery {
            query: " ".to_string(),
            comment: None,
        };
        assert_eq!(query.validate(), vec!["query was missing".to_string()]);
    }
}
