use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use rst_common::standard::chrono::Utc;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};

use crate::wallet::Wallet;

use super::types::ConnectionError;

const SIGNATURE_TYPE: &str = "https://didcomm.org/signature/1.0/ed25519Sha512_single";

/// `SignatureDecorator` is the `~sig` field decorator, `sig_data` holds an eight bytes
/// big endian timestamp followed by the signed json
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct SignatureDecorator {
    #[serde(rename = "@type")]
    pub signature_type: String,

    pub signature: String,
    pub sig_data: String,
    pub signer: String,
}

pub async fn sign_data(
    wallet: Arc<dyn Wallet>,
    data: &Value,
    signer: &str,
) -> Result<SignatureDecorator, ConnectionError> {
    let timestamp = Utc::now().timestamp().max(0) as u64;
    let json = serde_json::to_vec(data)
        .map_err(|err| ConnectionError::ValidationError(err.to_string()))?;

    let mut signed = timestamp.to_be_bytes().to_vec();
    signed.extend(json);

    let signature = wallet.sign(signed.clone(), signer.to_string()).await?;
    Ok(SignatureDecorator {
        signature_type: SIGNATURE_TYPE.to_string(),
        signature: URL_SAFE_NO_PAD.encode(signature),
        sig_data: URL_SAFE_NO_PAD.encode(signed),
        signer: signer.to_string(),
    })
}

/// `unpack_and_verify` returns the signed json after checking the signature
pub async fn unpack_and_verify(
    wallet: Arc<dyn Wallet>,
    decorator: &SignatureDecorator,
) -> Result<Value, ConnectionError> {
    let decode = |value: &str| {
        URL_SAFE_NO_PAD
            .decode(value.trim_end_matches('='))
            .map_err(|err| ConnectionError::ValidationError(err.to_string()))
    };

    let signed = decode(&decorator.sig_data)?;
    let signature = decode(&decorator.signature)?;
    if signed.len() <= 8 {
        return Err(ConnectionError::ValidationError(
            "sig_data was missing".to_string(),
        ));
    }

    let valid = wallet
        .verify(decorator.signer.to_owned(), signed.clone(), signature)
        .await?;

    if !valid {
        return Err(ConnectionError::ValidationError(
            "signature is not valid".to_string(),
        ));
    }

    serde_json::from_slice(&signed[8..])
        .map_err(|err| ConnectionError::ValidationError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use crate::wallet::LocalWallet;

    #[tokio::test]
    async fn test_sign_and_unpack() {
        let wallet: Arc<dyn Wallet> = Arc::new(LocalWallet::new());
        let info = wallet.create_did(None).await.unwrap();

        let data = json!({"DID": info.did});
        let decorator = sign_data(wallet.clone(), &data, &info.verkey).await.unwrap();
        assert_eq!(decorator.signer, info.verkey);

        let unpacked = unpack_and_verify(wallet, &decorator).await;
        assert_eq!(unpacked.unwrap(), data);
    }

    #[tokio::test]
    async fn test_unpack_wrong_signer() {
        let wallet: Arc<dyn Wallet> = Arc::new(LocalWallet::new());
        let info = wallet.create_did(None).await.unwrap();
        let other = wallet.create_did(None).await.unwrap();

        let mut decorator = sign_data(wallet.clone(), &json!({"DID": "x"}), &info.verkey)
            .await
            .unwrap();
        decorator.signer = other.verkey;

        let unpacked = unpack_and_verify(wallet, &decorator).await;
        assert!(matches!(
            unpacked.unwrap_err(),
            ConnectionError::ValidationError(_)
        ))
    }
}
