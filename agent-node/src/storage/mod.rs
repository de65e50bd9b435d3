//! `storage` persists agent records in rocksdb
//!
//! Every record lives under its own key. Each record type keeps ordered buckets of ids, one
//! for the whole type and one per tag value, used to answer tag queries in insertion order.
mod types;
pub use types::{DbError, Instruction, OutputOpts};

mod index;
pub use index::RecordIndex;

mod runner;
pub use runner::Runner;

mod rocks;
pub use rocks::RocksStorage;

mod builder;
pub use builder::Builder;
