//! `prople-agent-node` embeds the agent engine into a runnable HTTP node
//!
//! It parses the TOML configuration, persists records in rocksdb and carries envelopes
//! over HTTP. The daemon only needs [`AgentNode`] and [`Node::serve`].
pub mod common;
pub mod config;
pub mod storage;
pub mod transport;
pub mod backends;

mod node;
pub use node::{build_node, AgentNode, Node};
