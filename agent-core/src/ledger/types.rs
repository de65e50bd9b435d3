use std::collections::BTreeSet;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

/// `LedgerError` wraps ledger adapter failures verbatim
#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum LedgerError {
    #[error("ledger error: {0}")]
    LedgerError(String),

    #[error("ledger object not found: {0}")]
    NotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Schema {
    pub id: String,
    pub name: String,
    pub version: String,

    #[serde(rename = "attrNames")]
    pub attr_names: Vec<String>,

    #[serde(rename = "seqNo", skip_serializing_if = "Option::is_none", default)]
    pub seq_no: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialDefinition {
    pub id: String,

    #[serde(rename = "schemaId")]
    pub schema_id: String,

    pub tag: String,

    #[serde(default)]
    pub value: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RevocationRegistryDefinition {
    pub id: String,

    #[serde(rename = "credDefId")]
    pub cred_def_id: String,

    #[serde(default)]
    pub value: Value,
}

/// `RevocationRegistry` is the registry state at `timestamp`, `revoked` holds the
/// credential revocation ids revoked at that time
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RevocationRegistry {
    pub id: String,
    pub timestamp: u64,

    #[serde(default)]
    pub revoked: BTreeSet<String>,
}

impl RevocationRegistry {
    pub fn is_revoked(&self, cred_rev_id: &str) -> bool {
        self.revoked.contains(cred_rev_id)
    }
}

#[async_trait]
pub trait LedgerBuilder: Send + Sync {
    async fn get_schema(&self, id: String) -> Result<Schema, LedgerError>;
    async fn get_credential_definition(&self, id: String)
        -> Result<CredentialDefinition, LedgerError>;
    async fn get_revocation_registry_definition(
        &self,
        id: String,
    ) -> Result<RevocationRegistryDefinition, LedgerError>;
    async fn get_revocation_registry(
        &self,
        id: String,
        timestamp: u64,
    ) -> Result<RevocationRegistry, LedgerError>;
}
