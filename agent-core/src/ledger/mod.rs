//! `ledger` is the read side of the verifiable data registry
//!
//! The agent never writes to a ledger, it only reads schemas, credential definitions and
//! revocation registries. [`CachedLedger`] serves repeated reads from memory.
pub mod types;
pub use types::{
    CredentialDefinition, LedgerBuilder, LedgerError, RevocationRegistry,
    RevocationRegistryDefinition, Schema,
};

mod cache;
pub use cache::CachedLedger;
