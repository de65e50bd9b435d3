use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

/// `WalletError` is passed through from the backend without reinterpretation
#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum WalletError {
    #[error("indy sdk error: {0}")]
    IndySdkError(String),

    #[error("wallet item not found: {0}")]
    NotFound(String),

    #[error("method not implemented")]
    MethodNotImplemented,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct DidInfo {
    pub did: String,
    pub verkey: String,
}

/// `EncryptedMessage` is the wire envelope, opaque outside of the wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct EncryptedMessage {
    pub protected: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedMessage {
    pub plaintext: Value,
    pub sender_key: Option<String>,
    pub recipient_key: Option<String>,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn create_did(&self, seed: Option<String>) -> Result<DidInfo, WalletError>;
    async fn sign(&self, data: Vec<u8>, verkey: String) -> Result<Vec<u8>, WalletError>;
    async fn verify(
        &self,
        signer_verkey: String,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, WalletError>;

    /// `encrypt` uses authcrypt when `sender_key` is given, anoncrypt otherwise
    async fn encrypt(
        &self,
        payload: Value,
        recipient_keys: Vec<String>,
        sender_key: Option<String>,
    ) -> Result<EncryptedMessage, WalletError>;
    async fn decrypt(&self, message: EncryptedMessage) -> Result<DecryptedMessage, WalletError>;
    async fn generate_nonce(&self) -> Result<String, WalletError>;
}
