use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;

const DID_CONTEXT: &str = "https://w3id.org/did/v1";
const VERIFICATION_KEY_TYPE: &str = "Ed25519VerificationKey2018";
const DIDCOMM_SERVICE_TYPE: &str = "IndyAgent";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PublicKey {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: String,

    pub controller: String,

    #[serde(rename = "publicKeyBase58")]
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct DidCommService {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub priority: u32,

    #[serde(rename = "recipientKeys")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// `DidDoc` is the peer DID document exchanged inside connection requests and responses
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct DidDoc {
    #[serde(rename = "@context")]
    pub context: String,

    pub id: String,

    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKey>,

    #[serde(default)]
    pub authentication: Vec<Value>,

    #[serde(default)]
    pub service: Vec<DidCommService>,
}

impl DidDoc {
    /// `build` creates a document with one key and one service per endpoint
    pub fn build(did: &str, verkey: &str, endpoints: &[String], routing_keys: &[String]) -> Self {
        let key_id = format!("{}#1", did);
        let service = endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| DidCommService {
                id: format!("{}#IndyAgentService-{}", did, index + 1),
                service_type: DIDCOMM_SERVICE_TYPE.to_string(),
                priority: index as u32,
                recipient_keys: vec![verkey.to_string()],
                routing_keys: routing_keys.to_vec(),
                service_endpoint: endpoint.to_owned(),
            })
            .collect();

        Self {
            context: DID_CONTEXT.to_string(),
            id: did.to_string(),
            public_key: vec![PublicKey {
                id: key_id,
                key_type: VERIFICATION_KEY_TYPE.to_string(),
                controller: did.to_string(),
                value: verkey.to_string(),
            }],
            authentication: Vec::new(),
            service,
        }
    }

    /// `didcomm_services` returns the services sorted by priority
    pub fn didcomm_services(&self) -> Vec<DidCommService> {
        let mut services = self.service.clone();
        services.sort_by_key(|service| service.priority);
        services
    }

    pub fn first_recipient_key(&self) -> Option<String> {
        self.didcomm_services()
            .into_iter()
            .flat_map(|service| service.recipient_keys)
            .next()
    }
}
