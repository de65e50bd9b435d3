//! Proof request construction and credential selection helpers
//!
//! These work on plain values, the ledger lookups needed for revocation status stay in
//! the usecase.
use std::collections::{BTreeMap, BTreeSet};

use rst_common::standard::uuid::Uuid;

use crate::wallet::anoncreds::{
    AttributeFilter, AttributeInfo, CredentialInfo, PredicateInfo, ProofRequest,
    RequestedAttribute, RequestedCredentials, RequestedPredicate,
};

use super::preview::PresentationPreview;
use super::types::ProofError;

/// `RetrievedCredentials` holds every candidate per referent of a proof request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedCredentials {
    pub requested_attributes: BTreeMap<String, Vec<RequestedAttribute>>,
    pub requested_predicates: BTreeMap<String, Vec<RequestedPredicate>>,
}

impl RetrievedCredentials {
    /// `without_revoked` drops every candidate known to be revoked
    pub fn without_revoked(mut self) -> Self {
        for candidates in self.requested_attributes.values_mut() {
            candidates.retain(|candidate| candidate.revoked != Some(true));
        }

        for candidates in self.requested_predicates.values_mut() {
            candidates.retain(|candidate| candidate.revoked != Some(true));
        }

        self
    }
}

fn cred_def_restriction(cred_def_id: &Option<String>) -> Option<Vec<AttributeFilter>> {
    cred_def_id.as_ref().map(|id| {
        vec![AttributeFilter {
            cred_def_id: Some(id.to_owned()),
            ..Default::default()
        }]
    })
}

/// `proof_request_from_proposal` turns a presentation preview into a proof request
///
/// Attributes sharing a referent become a single `names` entry so they are proven by the
/// same credential.
pub fn proof_request_from_proposal(
    preview: &PresentationPreview,
    name: String,
    version: String,
    nonce: String,
) -> ProofRequest {
    let mut requested_attributes = BTreeMap::new();
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut grouped_cred_defs: BTreeMap<String, Option<String>> = BTreeMap::new();

    for attribute in &preview.attributes {
        match &attribute.referent {
            Some(referent) => {
                grouped
                    .entry(referent.to_owned())
                    .or_default()
                    .push(attribute.name.to_owned());
                grouped_cred_defs
                    .entry(referent.to_owned())
                    .or_insert_with(|| attribute.cred_def_id.clone());
            }
            None => {
                requested_attributes.insert(
                    Uuid::new_v4().to_string(),
                    AttributeInfo {
                        name: Some(attribute.name.to_owned()),
                        names: None,
                        restrictions: cred_def_restriction(&attribute.cred_def_id),
                        non_revoked: None,
                    },
                );
            }
        }
    }

    for (referent, names) in grouped {
        let cred_def_id = grouped_cred_defs.remove(&referent).flatten();
        requested_attributes.insert(
            referent,
            AttributeInfo {
                name: None,
                names: Some(names),
                restrictions: cred_def_restriction(&cred_def_id),
                non_revoked: None,
            },
        );
    }

    let requested_predicates = preview
        .predicates
        .iter()
        .map(|predicate| {
            (
                Uuid::new_v4().to_string(),
                PredicateInfo {
                    name: predicate.name.to_owned(),
                    p_type: predicate.predicate,
                    p_value: predicate.threshold,
                    restrictions: cred_def_restriction(&Some(predicate.cred_def_id.to_owned())),
                    non_revoked: None,
                },
            )
        })
        .collect();

    ProofRequest {
        name,
        version,
        nonce,
        requested_attributes,
        requested_predicates,
        non_revoked: None,
    }
}

/// `matches_proposal` holds when every requested name was proposed for the credential's
/// definition, with the proposed value when one was given
pub fn matches_proposal(
    credential: &CredentialInfo,
    names: &[String],
    proposal: &PresentationPreview,
) -> bool {
    names.iter().all(|name| {
        proposal.attributes.iter().any(|attribute| {
            attribute.name == *name
                && attribute.cred_def_id.as_deref() == Some(credential.cred_def_id.as_str())
                && attribute
                    .value
                    .as_ref()
                    .map(|value| credential.attrs.get(name) == Some(value))
                    .unwrap_or(true)
        })
    })
}

/// `proposal_matches_request` holds when the request asks for exactly the proposed
/// attribute and predicate names
pub fn proposal_matches_request(proposal: &PresentationPreview, request: &ProofRequest) -> bool {
    let proposed: BTreeSet<String> = proposal
        .attributes
        .iter()
        .map(|attribute| attribute.name.to_owned())
        .collect();

    let requested: BTreeSet<String> = request
        .requested_attributes
        .values()
        .flat_map(|info| info.attribute_names())
        .collect();

    let proposed_predicates: BTreeSet<String> = proposal
        .predicates
        .iter()
        .map(|predicate| predicate.name.to_owned())
        .collect();

    let requested_predicates: BTreeSet<String> = request
        .requested_predicates
        .values()
        .map(|predicate| predicate.name.to_owned())
        .collect();

    proposed == requested && proposed_predicates == requested_predicates
}

/// `auto_select` takes the first candidate per referent
pub fn auto_select(retrieved: RetrievedCredentials) -> Result<RequestedCredentials, ProofError> {
    let mut selected = RequestedCredentials::default();

    for (referent, candidates) in retrieved.requested_attributes {
        let pick = candidates
            .first()
            .cloned()
            .ok_or_else(|| {
                ProofError::NoCredentialsAvailable(format!(
                    "unable to select a credential for requested attribute {}",
                    referent
                ))
            })?;

        selected.requested_attributes.insert(referent, pick);
    }

    for (referent, candidates) in retrieved.requested_predicates {
        let pick = candidates
            .first()
            .cloned()
            .ok_or_else(|| {
                ProofError::NoCredentialsAvailable(format!(
                    "unable to select a credential for requested predicate {}",
                    referent
                ))
            })?;

        selected.requested_predicates.insert(referent, pick);
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    use table_test::table_test;

    use crate::proofs::preview::{PresentationPreviewAttribute, PresentationPreviewPredicate};
    use crate::wallet::anoncreds::PredicateType;

    fn build_attribute(
        name: &str,
        value: Option<&str>,
        referent: Option<&str>,
    ) -> PresentationPreviewAttribute {
        PresentationPreviewAttribute {
            name: name.to_string(),
            cred_def_id: Some("cred-def-1".to_string()),
            mime_type: None,
            value: value.map(|v| v.to_string()),
            referent: referent.map(|v| v.to_string()),
        }
    }

    fn build_credential(id: &str, cred_def_id: &str, name: &str) -> CredentialInfo {
        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), name.to_string());
        attrs.insert("age".to_string(), "99".to_string());

        CredentialInfo {
            referent: id.to_string(),
            attrs,
            schema_id: "schema-1".to_string(),
            cred_def_id: cred_def_id.to_string(),
            rev_reg_id: None,
            cred_rev_id: None,
        }
    }

    fn build_candidate(id: &str, revoked: Option<bool>) -> RequestedAttribute {
        RequestedAttribute {
            cred_id: id.to_string(),
            revealed: true,
            timestamp: None,
            credential_info: None,
            revoked,
        }
    }

    #[test]
    fn test_proof_request_from_proposal() {
        let preview = PresentationPreview::new(
            vec![
                build_attribute("name", None, None),
                build_attribute("street", None, Some("address")),
                build_attribute("city", None, Some("address")),
            ],
            vec![PresentationPreviewPredicate {
                name: "age".to_string(),
                cred_def_id: "cred-def-1".to_string(),
                predicate: PredicateType::GreaterThanOrEqual,
                threshold: 50,
            }],
        );

        let request = proof_request_from_proposal(
            &preview,
            "proof-request".to_string(),
            "1.0".to_string(),
            "1234".to_string(),
        );

        assert_eq!(request.requested_attributes.len(), 2);
        let group = request.requested_attributes.get("address").unwrap();
        assert_eq!(
            group.names,
            Some(vec!["street".to_string(), "city".to_string()])
        );

        let predicate = request.requested_predicates.values().next().unwrap();
        assert_eq!(predicate.p_value, 50);
        assert_eq!(
            predicate.restrictions.as_ref().unwrap()[0].cred_def_id,
            Some("cred-def-1".to_string())
        );
    }

    #[test]
    fn test_matches_proposal() {
        let scenarios = vec![
            (
                (build_credential("cred-1", "cred-def-1", "John"), Some("John")),
                true,
            ),
            (
                (build_credential("cred-2", "cred-def-1", "Jane"), Some("John")),
                false,
            ),
            ((build_credential("cred-3", "cred-def-1", "Jane"), None), true),
            (
                (build_credential("cred-4", "cred-def-2", "John"), Some("John")),
                false,
            ),
        ];

        for (validator, (credential, value), expected) in table_test!(scenarios) {
            let proposal = PresentationPreview::new(vec![build_attribute("name", value, None)], vec![]);
            let actual = matches_proposal(&credential, &["name".to_string()], &proposal);

            validator
                .given(&format!("{} / {:?}", credential.referent, value))
                .when("matching against the proposal")
                .then(&format!("it should be {}", expected))
                .assert_eq(expected, actual);
        }
    }

    #[test]
    fn test_auto_select_takes_first_candidate() {
        let mut retrieved = RetrievedCredentials::default();
        retrieved.requested_attributes.insert(
            "name".to_string(),
            vec![
                build_candidate("cred-1", Some(true)),
                build_candidate("cred-2", Some(false)),
            ],
        );

        let selected = auto_select(retrieved.clone()).unwrap();
        assert_eq!(
            selected.requested_attributes.get("name").unwrap().cred_id,
            "cred-1"
        );

        let selected = auto_select(retrieved.without_revoked()).unwrap();
        assert_eq!(
            selected.requested_attributes.get("name").unwrap().cred_id,
            "cred-2"
        );
    }

    #[test]
    fn test_auto_select_only_revoked_left() {
        let mut retrieved = RetrievedCredentials::default();
        retrieved.requested_attributes.insert(
            "name".to_string(),
            vec![build_candidate("cred-1", Some(true))],
        );

        assert!(matches!(
            auto_select(retrieved.without_revoked()).unwrap_err(),
            ProofError::NoCredentialsAvailable(_)
        ))
    }

    #[test]
    fn test_auto_select_without_candidates() {
        let mut retrieved = RetrievedCredentials::default();
        retrieved
            .requested_attributes
            .insert("name".to_string(), Vec::new());

        assert!(matches!(
            auto_select(retrieved).unwrap_err(),
            ProofError::NoCredentialsAvailable(_)
        ))
    }
}
