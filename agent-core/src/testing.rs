//! In-process fixtures shared by the scenario tests
//!
//! [`FakeLedger`] and [`FakeCredentialWallet`] keep anoncreds objects in memory and skip the
//! cryptography: a proof carries the revealed values plus the request nonce, verification
//! checks the nonce and that every referenced ledger object was provided.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::{json, Value};
use rst_common::standard::uuid::Uuid;
use rst_common::with_tokio::tokio::sync::{mpsc, RwLock};

use crate::agent::{Agent, AgentConfig, AgentDependencies};
use crate::connections::{
    ConnectionAPI, ConnectionRecord, CreateInvitationConfig, ReceiveInvitationConfig,
};
use crate::credentials::encoding::encode_raw;
use crate::ledger::{
    CredentialDefinition, LedgerBuilder, LedgerError, RevocationRegistry,
    RevocationRegistryDefinition, Schema,
};
use crate::routing::MediationRecipientAPI;
use crate::storage::InMemoryStorage;
use crate::transport::{InMemoryMessageQueue, MemoryHub, MemoryTransport};
use crate::wallet::anoncreds::{
    AttributeFilter, CredentialInfo, CredentialOffer, CredentialRequest, CredentialValue,
    CredentialValues, IndyCredential, IndyProof, ProofIdentifier, ProofRequest,
    RequestedCredentials, RequestedProof, RevealedAttribute, RevealedAttributeGroup,
    SubProofReferent,
};
use crate::wallet::{CredentialWallet, LocalWallet, WalletError};

pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const SCHEMA_ID: &str = "schema:faber:1.0";
pub(crate) const CRED_DEF_ID: &str = "creddef:faber:1:tag";

#[derive(Clone, Default)]
pub(crate) struct FakeLedger {
    schemas: Arc<RwLock<HashMap<String, Schema>>>,
    cred_defs: Arc<RwLock<HashMap<String, CredentialDefinition>>>,
    rev_reg_defs: Arc<RwLock<HashMap<String, RevocationRegistryDefinition>>>,
    rev_regs: Arc<RwLock<HashMap<String, RevocationRegistry>>>,
}

impl FakeLedger {
    /// `with_faber_schema` publishes a schema with `name`, `age` and `email` and one
    /// credential definition over it
    pub(crate) async fn with_faber_schema() -> Self {
        let ledger = Self::default();
        ledger
            .add_schema(Schema {
                id: SCHEMA_ID.to_string(),
                name: "faber".to_string(),
                version: "1.0".to_string(),
                attr_names: vec!["name".to_string(), "age".to_string(), "email".to_string()],
                seq_no: Some(1),
            })
            .await;

        ledger
            .add_cred_def(CredentialDefinition {
                id: CRED_DEF_ID.to_string(),
                schema_id: SCHEMA_ID.to_string(),
                tag: "tag".to_string(),
                value: json!({}),
            })
            .await;

        ledger
    }

    pub(crate) async fn add_schema(&self, schema: Schema) {
        self.schemas.write().await.insert(schema.id.to_owned(), schema);
    }

    pub(crate) async fn add_cred_def(&self, cred_def: CredentialDefinition) {
        self.cred_defs
            .write()
            .await
            .insert(cred_def.id.to_owned(), cred_def);
    }
}

#[async_trait]
impl LedgerBuilder for FakeLedger {
    async fn get_schema(&self, id: String) -> Result<Schema, LedgerError> {
        self.schemas
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn get_credential_definition(
        &self,
        id: String,
    ) -> Result<CredentialDefinition, LedgerError> {
        self.cred_defs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn get_revocation_registry_definition(
        &self,
        id: String,
    ) -> Result<RevocationRegistryDefinition, LedgerError> {
        self.rev_reg_defs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn get_revocation_registry(
        &self,
        id: String,
        timestamp: u64,
    ) -> Result<RevocationRegistry, LedgerError> {
        let registry = self
            .rev_regs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))?;

        Ok(RevocationRegistry {
            timestamp,
            ..registry
        })
    }
}

fn allowed(info: &CredentialInfo, restrictions: &Option<Vec<AttributeFilter>>) -> bool {
    match restrictions {
        Some(filters) if !filters.is_empty() => filters.iter().any(|filter| filter.matches(info)),
        _ => true,
    }
}

fn nonce() -> String {
    Uuid::new_v4().as_u128().to_string()
}

#[derive(Clone)]
pub(crate) struct FakeCredentialWallet {
    ledger: FakeLedger,
    credentials: Arc<RwLock<BTreeMap<String, CredentialInfo>>>,
}

impl FakeCredentialWallet {
    pub(crate) fn new(ledger: FakeLedger) -> Self {
        Self {
            ledger,
            credentials: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    async fn credential(&self, id: &str) -> Result<CredentialInfo, WalletError> {
        self.credentials
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("credential {}", id)))
    }

    fn revealed_value(info: &CredentialInfo, name: &str) -> Result<CredentialValue, WalletError> {
        let raw = info.attrs.get(name).ok_or_else(|| {
            WalletError::IndySdkError(format!(
                "credential {} has no attribute {}",
                info.referent, name
            ))
        })?;

        Ok(CredentialValue {
            raw: raw.to_owned(),
            encoded: encode_raw(raw),
        })
    }
}

#[async_trait]
impl CredentialWallet for FakeCredentialWallet {
    async fn create_credential_offer(
        &self,
        cred_def_id: String,
    ) -> Result<CredentialOffer, WalletError> {
        let cred_def = self
            .ledger
            .get_credential_definition(cred_def_id.to_owned())
            .await
            .map_err(|err| WalletError::NotFound(err.to_string()))?;

        Ok(CredentialOffer {
            schema_id: cred_def.schema_id,
            cred_def_id,
            nonce: nonce(),
            key_correctness_proof: json!({}),
        })
    }

    async fn create_credential_request(
        &self,
        prover_did: String,
        offer: CredentialOffer,
        cred_def: CredentialDefinition,
    ) -> Result<(CredentialRequest, Value), WalletError> {
        let request = CredentialRequest {
            prover_did,
            cred_def_id: cred_def.id,
            nonce: nonce(),
            blinded_ms: json!({}),
        };

        Ok((request, json!({ "nonce": offer.nonce })))
    }

    async fn create_credential(
        &self,
        offer: CredentialOffer,
        request: CredentialRequest,
        values: CredentialValues,
    ) -> Result<IndyCredential, WalletError> {
        Ok(IndyCredential {
            schema_id: offer.schema_id,
            cred_def_id: offer.cred_def_id,
            rev_reg_id: None,
            values,
            signature: json!({ "prover_did": request.prover_did }),
        })
    }

    async fn store_credential(
        &self,
        credential_id: Option<String>,
        _request_metadata: Value,
        credential: IndyCredential,
        _cred_def: CredentialDefinition,
        _rev_reg_def: Option<RevocationRegistryDefinition>,
    ) -> Result<String, WalletError> {
        let id = credential_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let info = CredentialInfo {
            referent: id.to_owned(),
            attrs: credential
                .values
                .iter()
                .map(|(name, value)| (name.to_owned(), value.raw.to_owned()))
                .collect(),
            schema_id: credential.schema_id,
            cred_def_id: credential.cred_def_id,
            rev_reg_id: credential.rev_reg_id,
            cred_rev_id: None,
        };

        self.credentials.write().await.insert(id.to_owned(), info);
        Ok(id)
    }

    async fn get_credential(&self, credential_id: String) -> Result<CredentialInfo, WalletError> {
        self.credential(&credential_id).await
    }

    async fn delete_credential(&self, credential_id: String) -> Result<(), WalletError> {
        self.credentials
            .write()
            .await
            .remove(&credential_id)
            .map(|_| ())
            .ok_or(WalletError::NotFound(credential_id))
    }

    async fn get_credentials_for_proof_request(
        &self,
        proof_request: ProofRequest,
        referent: String,
    ) -> Result<Vec<CredentialInfo>, WalletError> {
        let credentials = self.credentials.read().await;

        if let Some(requested) = proof_request.requested_attributes.get(&referent) {
            let names = requested.attribute_names();
            return Ok(credentials
                .values()
                .filter(|info| names.iter().all(|name| info.attrs.contains_key(name)))
                .filter(|info| allowed(info, &requested.restrictions))
                .cloned()
                .collect());
        }

        if let Some(requested) = proof_request.requested_predicates.get(&referent) {
            return Ok(credentials
                .values()
                .filter(|info| {
                    info.attrs
                        .get(&requested.name)
                        .and_then(|raw| raw.parse::<i64>().ok())
                        .map(|value| requested.p_type.holds(value, requested.p_value))
                        .unwrap_or(false)
                })
                .filter(|info| allowed(info, &requested.restrictions))
                .cloned()
                .collect());
        }

        Ok(Vec::new())
    }

    async fn create_proof(
        &self,
        proof_request: ProofRequest,
        requested_credentials: RequestedCredentials,
        schemas: BTreeMap<String, Schema>,
        cred_defs: BTreeMap<String, CredentialDefinition>,
    ) -> Result<IndyProof, WalletError> {
        let credential_ids = requested_credentials.credential_ids();
        let mut identifiers = Vec::new();
        for id in &credential_ids {
            let info = self.credential(id).await?;
            if !schemas.contains_key(&info.schema_id) || !cred_defs.contains_key(&info.cred_def_id)
            {
                return Err(WalletError::IndySdkError(format!(
                    "ledger objects missing for credential {}",
                    id
                )));
            }

            identifiers.push(ProofIdentifier {
                schema_id: info.schema_id,
                cred_def_id: info.cred_def_id,
                rev_reg_id: info.rev_reg_id,
                timestamp: None,
            });
        }

        let sub_proof_index = |cred_id: &str| -> u32 {
            credential_ids
                .iter()
                .position(|id| id == cred_id)
                .unwrap_or_default() as u32
        };

        let mut requested_proof = RequestedProof {
            self_attested_attrs: requested_credentials.self_attested_attributes.clone(),
            ..Default::default()
        };

        for (referent, requested) in &requested_credentials.requested_attributes {
            let info = self.credential(&requested.cred_id).await?;
            let index = sub_proof_index(&requested.cred_id);
            let attribute = proof_request
                .requested_attributes
                .get(referent)
                .ok_or_else(|| WalletError::IndySdkError(format!("unknown referent {}", referent)))?;

            if !requested.revealed {
                requested_proof.unrevealed_attrs.insert(
                    referent.to_owned(),
                    SubProofReferent {
                        sub_proof_index: index,
                    },
                );
                continue;
            }

            match (&attribute.name, &attribute.names) {
                (Some(name), _) => {
                    let value = Self::revealed_value(&info, name)?;
                    requested_proof.revealed_attrs.insert(
                        referent.to_owned(),
                        RevealedAttribute {
                            sub_proof_index: index,
                            raw: value.raw,
                            encoded: value.encoded,
                        },
                    );
                }
                (None, Some(names)) => {
                    let mut values = CredentialValues::new();
                    for name in names {
                        values.insert(name.to_owned(), Self::revealed_value(&info, name)?);
                    }

                    requested_proof.revealed_attr_groups.insert(
                        referent.to_owned(),
                        RevealedAttributeGroup {
                            sub_proof_index: index,
                            values,
                        },
                    );
                }
                (None, None) => {
                    return Err(WalletError::IndySdkError(format!(
                        "referent {} names no attribute",
                        referent
                    )))
                }
            }
        }

        for (referent, requested) in &requested_credentials.requested_predicates {
            let info = self.credential(&requested.cred_id).await?;
            let predicate = proof_request
                .requested_predicates
                .get(referent)
                .ok_or_else(|| WalletError::IndySdkError(format!("unknown referent {}", referent)))?;

            let satisfied = info
                .attrs
                .get(&predicate.name)
                .and_then(|raw| raw.parse::<i64>().ok())
                .map(|value| predicate.p_type.holds(value, predicate.p_value))
                .unwrap_or(false);

            if !satisfied {
                return Err(WalletError::IndySdkError(format!(
                    "predicate {} not satisfied",
                    referent
                )));
            }

            requested_proof.predicates.insert(
                referent.to_owned(),
                SubProofReferent {
                    sub_proof_index: sub_proof_index(&requested.cred_id),
                },
            );
        }

        Ok(IndyProof {
            proof: json!({ "nonce": proof_request.nonce }),
            requested_proof,
            identifiers,
        })
    }

    async fn verify_proof(
        &self,
        proof_request: ProofRequest,
        proof: IndyProof,
        schemas: BTreeMap<String, Schema>,
        cred_defs: BTreeMap<String, CredentialDefinition>,
        _rev_reg_defs: BTreeMap<String, RevocationRegistryDefinition>,
        _rev_regs: BTreeMap<String, BTreeMap<u64, RevocationRegistry>>,
    ) -> Result<bool, WalletError> {
        if proof.proof["nonce"] != Value::from(proof_request.nonce) {
            return Ok(false);
        }

        let known = proof.identifiers.iter().all(|identifier| {
            schemas.contains_key(&identifier.schema_id)
                && cred_defs.contains_key(&identifier.cred_def_id)
        });

        let answered = proof_request.requested_attributes.keys().all(|referent| {
            proof.requested_proof.revealed_attrs.contains_key(referent)
                || proof.requested_proof.revealed_attr_groups.contains_key(referent)
                || proof.requested_proof.unrevealed_attrs.contains_key(referent)
                || proof.requested_proof.self_attested_attrs.contains_key(referent)
        }) && proof_request
            .requested_predicates
            .keys()
            .all(|referent| proof.requested_proof.predicates.contains_key(referent));

        Ok(known && answered)
    }
}

/// `build_agent` starts an agent serving `memory://<label>` on the hub
pub(crate) async fn build_agent(
    hub: &MemoryHub,
    ledger: &FakeLedger,
    config: AgentConfig,
) -> Agent<InMemoryStorage> {
    let endpoint = format!("memory://{}", config.label);
    let config = AgentConfig {
        endpoints: vec![endpoint.to_owned()],
        ..config
    };

    let (inbound, inbound_receiver) = mpsc::unbounded_channel();
    let deps = AgentDependencies {
        wallet: Arc::new(LocalWallet::new()),
        credential_wallet: Arc::new(FakeCredentialWallet::new(ledger.clone())),
        ledger: Arc::new(ledger.clone()),
        transports: vec![Arc::new(MemoryTransport::new(hub.clone(), inbound.clone()))],
        queue: Arc::new(InMemoryMessageQueue::new()),
    };

    let agent = Agent::new(config, InMemoryStorage::new(), deps, inbound);
    let endpoint = hub.register(&endpoint).await;
    agent.listen_memory(endpoint).await;

    agent
        .initialize(inbound_receiver)
        .await
        .expect("agent initialized");
    agent
}

/// `connect` runs a full connection protocol between two agents, returning the inviter and
/// invitee records once both are completed
pub(crate) async fn connect(
    inviter: &Agent<InMemoryStorage>,
    invitee: &Agent<InMemoryStorage>,
) -> (ConnectionRecord, ConnectionRecord) {
    let routing = inviter
        .mediation_recipient()
        .get_routing(None)
        .await
        .expect("inviter routing");

    let (inviter_record, invitation) = inviter
        .connections()
        .create_invitation(CreateInvitationConfig {
            label: None,
            alias: None,
            image_url: None,
            multi_use: false,
            auto_accept: Some(true),
            routing,
        })
        .await
        .expect("invitation created");

    let routing = invitee
        .mediation_recipient()
        .get_routing(None)
        .await
        .expect("invitee routing");

    let invitee_record = invitee
        .connections()
        .receive_invitation(
            invitation,
            ReceiveInvitationConfig {
                alias: None,
                auto_accept: Some(true),
                routing,
            },
        )
        .await
        .expect("invitation received");

    let invitee_record = invitee
        .connections()
        .return_when_connected(invitee_record.id, TIMEOUT)
        .await
        .expect("invitee connected");

    let inviter_record = inviter
        .connections()
        .return_when_connected(inviter_record.id, TIMEOUT)
        .await
        .expect("inviter connected");

    (inviter_record, invitee_record)
}
