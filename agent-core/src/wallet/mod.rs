//! `wallet` defines the cryptographic capabilities consumed by the protocols
//!
//! Key management, message encryption and anoncreds operations stay behind the [`Wallet`]
//! and [`CredentialWallet`] traits, their errors are passed through unchanged.
pub mod types;
pub use types::{DecryptedMessage, DidInfo, EncryptedMessage, Wallet, WalletError};

pub mod anoncreds;
pub use anoncreds::CredentialWallet;

mod local;
pub use local::LocalWallet;
