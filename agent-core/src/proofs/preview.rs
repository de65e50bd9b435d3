use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::wallet::anoncreds::PredicateType;

pub const PRESENTATION_PREVIEW: &str =
    "https://didcomm.org/present-proof/1.0/presentation-preview";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PresentationPreviewAttribute {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cred_def_id: Option<String>,

    #[serde(rename = "mime-type", skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,

    /// attributes sharing a referent must be proven by the same credential
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub referent: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PresentationPreviewPredicate {
    pub name: String,
    pub cred_def_id: String,
    pub predicate: PredicateType,
    pub threshold: i64,
}

/// `PresentationPreview` is what a prover offers to disclose
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PresentationPreview {
    #[serde(rename = "@type")]
    pub preview_type: String,

    #[serde(default)]
    pub attributes: Vec<PresentationPreviewAttribute>,

    #[serde(default)]
    pub predicates: Vec<PresentationPreviewPredicate>,
}

impl PresentationPreview {
    pub fn new(
        attributes: Vec<PresentationPreviewAttribute>,
        predicates: Vec<PresentationPreviewPredicate>,
    ) -> Self {
        Self {
            preview_type: PRESENTATION_PREVIEW.to_string(),
            attributes,
            predicates,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.attributes.is_empty() && self.predicates.is_empty() {
            errors.push("presentation_proposal.attributes was missing".to_string());
        }

        if self.attributes.iter().any(|attr| attr.name.is_empty()) {
            errors.push("presentation_proposal.attributes.name was missing".to_string());
        }

        errors
    }
}
