//! Backends the node plugs in when no anoncreds wallet or ledger adapter is configured
//!
//! Every call fails, so connections, mediation and basic messages keep working while the
//! credential and proof exchanges stop at their first anoncreds step.
use std::collections::BTreeMap;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::Value;

use prople_agent_core::ledger::{
    CredentialDefinition, LedgerBuilder, LedgerError, RevocationRegistry,
    RevocationRegistryDefinition, Schema,
};
use prople_agent_core::wallet::anoncreds::{
    CredentialInfo, CredentialOffer, CredentialRequest, CredentialValues, IndyCredential,
    IndyProof, ProofRequest, RequestedCredentials,
};
use prople_agent_core::wallet::{CredentialWallet, WalletError};

#[derive(Clone, Default)]
pub struct UnsupportedCredentialWallet;

#[async_trait]
impl CredentialWallet for UnsupportedCredentialWallet {
    async fn create_credential_offer(
        &self,
        _cred_def_id: String,
    ) -> Result<CredentialOffer, WalletError> {
        Err(WalletError::MethodNotImplemented)
    }

    async fn create_credential_request(
        &self,
        _prover_did: String,
        _offer: CredentialOffer,
        _cred_def: CredentialDefinition,
    ) -> Result<(CredentialRequest, Value), WalletError> {
        Err(WalletError::MethodNotImplemented)
    }

    async fn create_credential(
        &self,
        _offer: CredentialOffer,
        _request: CredentialRequest,
        _values: CredentialValues,
    ) -> Result<IndyCredential, WalletError> {
        Err(WalletError::MethodNotImplemented)
    }

    async fn store_credential(
        &self,
        _credential_id: Option<String>,
        _request_metadata: Value,
        _credential: IndyCredential,
        _cred_def: CredentialDefinition,
        _rev_reg_def: Option<RevocationRegistryDefinition>,
    ) -> Result<String, WalletError> {
        Err(WalletError::MethodNotImplemented)
    }

    async fn get_credential(&self, credential_id: String) -> Result<CredentialInfo, WalletError> {
        Err(WalletError::NotFound(credential_id))
    }

    async fn delete_credential(&self, credential_id: String) -> Result<(), WalletError> {
        Err(WalletError::NotFound(credential_id))
    }

    async fn get_credentials_for_proof_request(
        &self,
        _proof_request: ProofRequest,
        _referent: String,
    ) -> Result<Vec<CredentialInfo>, WalletError> {
        Ok(Vec::new())
    }

    async fn create_proof(
        &self,
        _proof_request: ProofRequest,
        _requested_credentials: RequestedCredentials,
        _schemas: BTreeMap<String, Schema>,
        _cred_defs: BTreeMap<String, CredentialDefinition>,
    ) -> Result<IndyProof, WalletError> {
        Err(WalletError::MethodNotImplemented)
    }

    async fn verify_proof(
        &self,
        _proof_request: ProofRequest,
        _proof: IndyProof,
        _schemas: BTreeMap<String, Schema>,
        _cred_defs: BTreeMap<String, CredentialDefinition>,
        _rev_reg_defs: BTreeMap<String, RevocationRegistryDefinition>,
        _rev_regs: BTreeMap<String, BTreeMap<u64, RevocationRegistry>>,
    ) -> Result<bool, WalletError> {
        Err(WalletError::MethodNotImplemented)
    }
}

#[derive(Clone, Default)]
pub struct UnsupportedLedger;

fn ledger_missing(id: &str) -> LedgerError {
    LedgerError::LedgerError(format!("no ledger configured to resolve {}", id))
}

#[async_trait]
impl LedgerBuilder for UnsupportedLedger {
    async fn get_schema(&self, id: String) -> Result<Schema, LedgerError> {
        Err(ledger_missing(&id))
    }

    async fn get_credential_definition(
        &self,
        id: String,
    ) -> Result<CredentialDefinition, LedgerError> {
        Err(ledger_missing(&id))
    }

    async fn get_revocation_registry_definition(
        &self,
        id: String,
    ) -> Result<RevocationRegistryDefinition, LedgerError> {
        Err(ledger_missing(&id))
    }

    async fn get_revocation_registry(
        &self,
        id: String,
        _timestamp: u64,
    ) -> Result<RevocationRegistry, LedgerError> {
        Err(ledger_missing(&id))
    }
}
