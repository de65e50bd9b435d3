//! `prople-agent-core` is the protocol engine of a DIDComm agent
//!
//! It owns the exchange state machines (connections, credentials, proofs), the mediated
//! routing pipeline and the inbound dispatcher. Cryptography, ledger reads and the network
//! are consumed through the [`wallet`], [`ledger`] and [`transport`] traits so the embedding
//! node decides which backends to plug in.
pub mod agent;
pub mod basic_messages;
pub mod connections;
pub mod credentials;
pub mod discover_features;
pub mod events;
pub mod ledger;
pub mod messaging;
pub mod proofs;
pub mod routing;
pub mod storage;
pub mod transport;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;
