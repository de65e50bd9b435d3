use std::collections::BTreeMap;

use rst_common::standard::serde::{self, Deserialize, Serialize};

pub const CREDENTIAL_PREVIEW: &str =
    "https://didcomm.org/issue-credential/1.0/credential-preview";

const TEXT_PLAIN: &str = "text/plain";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialPreviewAttribute {
    pub name: String,

    #[serde(rename = "mime-type", skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,

    pub value: String,
}

impl CredentialPreviewAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: Some(TEXT_PLAIN.to_string()),
            value: value.to_string(),
        }
    }
}

/// `CredentialPreview` is the human readable list of attributes of an offered or
/// proposed credential
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub preview_type: String,

    pub attributes: Vec<CredentialPreviewAttribute>,
}

impl CredentialPreview {
    pub fn new(attributes: Vec<CredentialPreviewAttribute>) -> Self {
        Self {
            preview_type: CREDENTIAL_PREVIEW.to_string(),
            attributes,
        }
    }

    /// `from_record` builds `text/plain` attributes from a name to value map
    pub fn from_record(record: &BTreeMap<String, String>) -> Self {
        let attributes = record
            .iter()
            .map(|(name, value)| CredentialPreviewAttribute::new(name, value))
            .collect();

        Self::new(attributes)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes
            .iter()
            .map(|attr| attr.name.to_owned())
            .collect()
    }

    /// `same_values` compares name/value pairs regardless of order and mime type
    pub fn same_values(&self, other: &CredentialPreview) -> bool {
        let collect = |preview: &CredentialPreview| -> BTreeMap<String, String> {
            preview
                .attributes
                .iter()
                .map(|attr| (attr.name.to_owned(), attr.value.to_owned()))
                .collect()
        };

        self.attributes.len() == other.attributes.len() && collect(self) == collect(other)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.attributes.is_empty() {
            errors.push("credential_preview.attributes was missing".to_string());
        }

        if self.attributes.iter().any(|attr| attr.name.is_empty()) {
            errors.push("credential_preview.attributes.name was missing".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::{self, json};

    #[test]
    fn test_from_record() {
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), "Alice".to_string());
        values.insert("age".to_string(), "30".to_string());

        let preview = CredentialPreview::from_record(&values);
        assert_eq!(
            preview.attribute_names(),
            vec!["age".to_string(), "name".to_string()]
        );

        let value = serde_json::to_value(&preview).unwrap();
        assert_eq!(value["@type"], json!(CREDENTIAL_PREVIEW));
        assert_eq!(value["attributes"][0]["mime-type"], json!("text/plain"));
    }

    #[test]
    fn test_same_values_ignores_order() {
        let first = CredentialPreview::new(vec![
            CredentialPreviewAttribute::new("name", "Alice"),
            CredentialPreviewAttribute::new("age", "30"),
        ]);

        let second = CredentialPreview::new(vec![
            CredentialPreviewAttribute::new("age", "30"),
            CredentialPreviewAttribute::new("name", "Alice"),
        ]);
        assert!(first.same_values(&second));

        let changed = CredentialPreview::new(vec![
            CredentialPreviewAttribute::new("age", "31"),
            CredentialPreviewAttribute::new("name", "Alice"),
        ]);
        assert!(!first.same_values(&changed));
    }

    #[test]
    fn test_validate_empty() {
        let preview = CredentialPreview::new(vec![]);
        assert_eq!(preview.validate().len(), 1);
    }
}
