use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use sha2::{Digest, Sha256};

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};
use rst_common::standard::uuid::Uuid;
use rst_common::with_tokio::tokio::sync::RwLock;

use prople_did_core::did::DID;

use super::types::{DecryptedMessage, DidInfo, EncryptedMessage, Wallet, WalletError};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
struct Protected {
    enc: String,
    recipients: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    sender: Option<String>,
}

/// `LocalWallet` is a development wallet kept in process memory
///
/// DIDs come from `prople_did_core`, verkeys are digests of the DID. Envelopes are only
/// encoded and integrity tagged, not encrypted, so this wallet must not be used with real
/// peers. It still enforces that a message can only be opened by a wallet owning one of the
/// recipient keys.
#[derive(Clone, Default)]
pub struct LocalWallet {
    keys: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalWallet {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }

        hasher.finalize().to_vec()
    }

    fn envelope_tag(protected: &str, ciphertext: &str) -> String {
        URL_SAFE_NO_PAD.encode(Self::digest(&[protected.as_bytes(), ciphertext.as_bytes()]))
    }

    fn decode_b64(value: &str) -> Result<Vec<u8>, WalletError> {
        STANDARD
            .decode(value)
            .map_err(|err| WalletError::IndySdkError(err.to_string()))
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    async fn create_did(&self, seed: Option<String>) -> Result<DidInfo, WalletError> {
        let did = DID::new();
        let identity = did
            .identity()
            .map_err(|err| WalletError::IndySdkError(err.to_string()))?;

        let did_value = identity.value();
        let material = seed.unwrap_or_else(|| Uuid::new_v4().to_string());
        let verkey =
            URL_SAFE_NO_PAD.encode(Self::digest(&[did_value.as_bytes(), material.as_bytes()]));

        self.keys
            .write()
            .await
            .insert(verkey.to_owned(), did_value.to_owned());

        Ok(DidInfo {
            did: did_value,
            verkey,
        })
    }

    async fn sign(&self, data: Vec<u8>, verkey: String) -> Result<Vec<u8>, WalletError> {
        if !self.keys.read().await.contains_key(&verkey) {
            return Err(WalletError::NotFound(format!("verkey {}", verkey)));
        }

        Ok(Self::digest(&[verkey.as_bytes(), &data]))
    }

    async fn verify(
        &self,
        signer_verkey: String,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, WalletError> {
        Ok(Self::digest(&[signer_verkey.as_bytes(), &data]) == signature)
    }

    async fn encrypt(
        &self,
        payload: Value,
        recipient_keys: Vec<String>,
        sender_key: Option<String>,
    ) -> Result<EncryptedMessage, WalletError> {
        if recipient_keys.is_empty() {
            return Err(WalletError::IndySdkError(
                "recipient_keys was missing".to_string(),
            ));
        }

        let enc = match sender_key {
            Some(_) => "authcrypt",
            None => "anoncrypt",
        };

        let protected = Protected {
            enc: enc.to_string(),
            recipients: recipient_keys,
            sender: sender_key,
        };

        let protected_json = serde_json::to_vec(&protected)
            .map_err(|err| WalletError::IndySdkError(err.to_string()))?;
        let payload_json = serde_json::to_vec(&payload)
            .map_err(|err| WalletError::IndySdkError(err.to_string()))?;

        let protected = STANDARD.encode(protected_json);
        let ciphertext = STANDARD.encode(payload_json);
        let tag = Self::envelope_tag(&protected, &ciphertext);

        Ok(EncryptedMessage {
            protected,
            iv: Uuid::new_v4().simple().to_string(),
            ciphertext,
            tag,
        })
    }

    async fn decrypt(&self, message: EncryptedMessage) -> Result<DecryptedMessage, WalletError> {
        if Self::envelope_tag(&message.protected, &message.ciphertext) != message.tag {
            return Err(WalletError::IndySdkError(
                "envelope integrity check failed".to_string(),
            ));
        }

        let protected: Protected = serde_json::from_slice(&Self::decode_b64(&message.protected)?)
            .map_err(|err| WalletError::IndySdkError(err.to_string()))?;

        let recipient_key = {
            let keys = self.keys.read().await;
            protected
                .recipients
                .iter()
                .find(|key| keys.contains_key(*key))
                .cloned()
        }
        .ok_or_else(|| {
            WalletError::NotFound("no recipient key owned by this wallet".to_string())
        })?;

        let plaintext: Value = serde_json::from_slice(&Self::decode_b64(&message.ciphertext)?)
            .map_err(|err| WalletError::IndySdkError(err.to_string()))?;

        Ok(DecryptedMessage {
            plaintext,
            sender_key: protected.sender,
            recipient_key: Some(recipient_key),
        })
    }

    async fn generate_nonce(&self) -> Result<String, WalletError> {
        Ok(Uuid::new_v4().as_u128().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    #[tokio::test]
    async fn test_sign_and_verify() {
        let wallet = LocalWallet::new();
        let info = wallet.create_did(None).await.unwrap();
        assert!(info.did.starts_with("did:"));

        let signature = wallet
            .sign(b"payload".to_vec(), info.verkey.to_owned())
            .await
            .unwrap();

        let valid = wallet
            .verify(info.verkey.to_owned(), b"payload".to_vec(), signature.clone())
            .await;
        assert!(valid.unwrap());

        let tampered = wallet
            .verify(info.verkey, b"other".to_vec(), signature)
            .await;
        assert!(!tampered.unwrap());
    }

    #[tokio::test]
    async fn test_sign_unknown_key() {
        let wallet = LocalWallet::new();
        let signature = wallet.sign(b"payload".to_vec(), "unknown".to_string()).await;
        assert!(matches!(signature.unwrap_err(), WalletError::NotFound(_)))
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_between_wallets() {
        let alice = LocalWallet::new();
        let bob = LocalWallet::new();

        let alice_info = alice.create_did(None).await.unwrap();
        let bob_info = bob.create_did(None).await.unwrap();

        let payload = json!({"@id": "1", "@type": "https://didcomm.org/trust_ping/1.0/ping"});
        let encrypted = alice
            .encrypt(
                payload.clone(),
                vec![bob_info.verkey.to_owned()],
                Some(alice_info.verkey.to_owned()),
            )
            .await
            .unwrap();

        let decrypted = bob.decrypt(encrypted.clone()).await.unwrap();
        assert_eq!(decrypted.plaintext, payload);
        assert_eq!(decrypted.sender_key, Some(alice_info.verkey));
        assert_eq!(decrypted.recipient_key, Some(bob_info.verkey));

        let not_owner = alice.decrypt(encrypted).await;
        assert!(matches!(not_owner.unwrap_err(), WalletError::NotFound(_)))
    }

    #[tokio::test]
    async fn test_decrypt_tampered_envelope() {
        let wallet = LocalWallet::new();
        let info = wallet.create_did(None).await.unwrap();

        let mut encrypted = wallet
            .encrypt(json!({"content": "hello"}), vec![info.verkey], None)
            .await
            .unwrap();
        encrypted.ciphertext = STANDARD.encode(b"{\"content\":\"bye\"}");

        let decrypted = wallet.decrypt(encrypted).await;
        assert!(matches!(
            decrypted.unwrap_err(),
            WalletError::IndySdkError(_)
        ))
    }
}
