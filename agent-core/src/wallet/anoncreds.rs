use std::collections::BTreeMap;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;

use crate::ledger::{
    CredentialDefinition, RevocationRegistry, RevocationRegistryDefinition, Schema,
};

use super::types::WalletError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialValue {
    pub raw: String,
    pub encoded: String,
}

pub type CredentialValues = BTreeMap<String, CredentialValue>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialOffer {
    pub schema_id: String,
    pub cred_def_id: String,
    pub nonce: String,

    #[serde(default)]
    pub key_correctness_proof: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialRequest {
    pub prover_did: String,
    pub cred_def_id: String,
    pub nonce: String,

    #[serde(default)]
    pub blinded_ms: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct IndyCredential {
    pub schema_id: String,
    pub cred_def_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rev_reg_id: Option<String>,

    pub values: CredentialValues,

    #[serde(default)]
    pub signature: Value,
}

/// `CredentialInfo` is a stored credential as listed by the holder wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialInfo {
    pub referent: String,
    pub attrs: BTreeMap<String, String>,
    pub schema_id: String,
    pub cred_def_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rev_reg_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cred_rev_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct RevocationInterval {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub from: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct AttributeFilter {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_issuer_did: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub issuer_did: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cred_def_id: Option<String>,
}

impl AttributeFilter {
    /// `matches` only checks the fields known from a stored credential
    pub fn matches(&self, credential: &CredentialInfo) -> bool {
        let schema = self
            .schema_id
            .as_ref()
            .map(|id| id == &credential.schema_id)
            .unwrap_or(true);

        let cred_def = self
            .cred_def_id
            .as_ref()
            .map(|id| id == &credential.cred_def_id)
            .unwrap_or(true);

        schema && cred_def
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct AttributeInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub names: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub restrictions: Option<Vec<AttributeFilter>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub non_revoked: Option<RevocationInterval>,
}

impl AttributeInfo {
    pub fn attribute_names(&self) -> Vec<String> {
        match (&self.name, &self.names) {
            (Some(name), _) => vec![name.to_owned()],
            (None, Some(names)) => names.to_owned(),
            (None, None) => Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GreaterThanOrEqual,

    #[serde(rename = ">")]
    GreaterThan,

    #[serde(rename = "<=")]
    LessThanOrEqual,

    #[serde(rename = "<")]
    LessThan,
}

impl PredicateType {
    pub fn holds(&self, value: i64, threshold: i64) -> bool {
        match self {
            PredicateType::GreaterThanOrEqual => value >= threshold,
            PredicateType::GreaterThan => value > threshold,
            PredicateType::LessThanOrEqual => value <= threshold,
            PredicateType::LessThan => value < threshold,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub restrictions: Option<Vec<AttributeFilter>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub non_revoked: Option<RevocationInterval>,
}

/// `ProofRequest` is the indy proof request carried by a `request-presentation`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProofRequest {
    pub name: String,
    pub version: String,
    pub nonce: String,

    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,

    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub non_revoked: Option<RevocationInterval>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RequestedAttribute {
    pub cred_id: String,
    pub revealed: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credential_info: Option<CredentialInfo>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RequestedPredicate {
    pub cred_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credential_info: Option<CredentialInfo>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked: Option<bool>,
}

/// `RequestedCredentials` is the holder's selection, one credential per referent
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct RequestedCredentials {
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,

    #[serde(default)]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,

    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
}

impl RequestedCredentials {
    /// `credential_ids` lists each selected credential once
    pub fn credential_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .requested_attributes
            .values()
            .map(|attr| attr.cred_id.to_owned())
            .chain(
                self.requested_predicates
                    .values()
                    .map(|pred| pred.cred_id.to_owned()),
            )
            .collect();

        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RevealedAttribute {
    pub sub_proof_index: u32,
    pub raw: String,
    pub encoded: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RevealedAttributeGroup {
    pub sub_proof_index: u32,
    pub values: CredentialValues,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct SubProofReferent {
    pub sub_proof_index: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttribute>,

    #[serde(default)]
    pub revealed_attr_groups: BTreeMap<String, RevealedAttributeGroup>,

    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,

    #[serde(default)]
    pub unrevealed_attrs: BTreeMap<String, SubProofReferent>,

    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReferent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ProofIdentifier {
    pub schema_id: String,
    pub cred_def_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rev_reg_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct IndyProof {
    #[serde(default)]
    pub proof: Value,

    pub requested_proof: RequestedProof,
    pub identifiers: Vec<ProofIdentifier>,
}

impl IndyProof {
    /// `revealed_values` lists every `(raw, encoded)` pair the prover disclosed
    pub fn revealed_values(&self) -> Vec<(String, String)> {
        let single = self
            .requested_proof
            .revealed_attrs
            .values()
            .map(|attr| (attr.raw.to_owned(), attr.encoded.to_owned()));

        let grouped = self
            .requested_proof
            .revealed_attr_groups
            .values()
            .flat_map(|group| group.values.values())
            .map(|value| (value.raw.to_owned(), value.encoded.to_owned()));

        single.chain(grouped).collect()
    }
}

/// `CredentialWallet` is the anoncreds side of the wallet
///
/// Issuer, holder and verifier operations share one trait so an agent can play every role
#[async_trait]
pub trait CredentialWallet: Send + Sync {
    async fn create_credential_offer(
        &self,
        cred_def_id: String,
    ) -> Result<CredentialOffer, WalletError>;

    async fn create_credential_request(
        &self,
        prover_did: String,
        offer: CredentialOffer,
        cred_def: CredentialDefinition,
    ) -> Result<(CredentialRequest, Value), WalletError>;

    async fn create_credential(
        &self,
        offer: CredentialOffer,
        request: CredentialRequest,
        values: CredentialValues,
    ) -> Result<IndyCredential, WalletError>;

    async fn store_credential(
        &self,
        credential_id: Option<String>,
        request_metadata: Value,
        credential: IndyCredential,
        cred_def: CredentialDefinition,
        rev_reg_def: Option<RevocationRegistryDefinition>,
    ) -> Result<String, WalletError>;

    async fn get_credential(&self, credential_id: String) -> Result<CredentialInfo, WalletError>;
    async fn delete_credential(&self, credential_id: String) -> Result<(), WalletError>;

    async fn get_credentials_for_proof_request(
        &self,
        proof_request: ProofRequest,
        referent: String,
    ) -> Result<Vec<CredentialInfo>, WalletError>;

    async fn create_proof(
        &self,
        proof_request: ProofRequest,
        requested_credentials: RequestedCredentials,
        schemas: BTreeMap<String, Schema>,
        cred_defs: BTreeMap<String, CredentialDefinition>,
    ) -> Result<IndyProof, WalletError>;

    async fn verify_proof(
        &self,
        proof_request: ProofRequest,
        proof: IndyProof,
        schemas: BTreeMap<String, Schema>,
        cred_defs: BTreeMap<String, CredentialDefinition>,
        rev_reg_defs: BTreeMap<String, RevocationRegistryDefinition>,
        rev_regs: BTreeMap<String, BTreeMap<u64, RevocationRegistry>>,
    ) -> Result<bool, WalletError>;
}
