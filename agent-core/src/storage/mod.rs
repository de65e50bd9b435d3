//! `storage` is the single source of truth for every exchange record
//!
//! Records are persisted through a [`StorageBuilder`] backend and accessed with a typed
//! [`Repository`]. Each record keeps a `version` used for optimistic concurrency, so a
//! stale update is rejected with [`StorageError::RecordConflict`] instead of overwriting.
pub mod types;
pub use types::{Query, Record, StorageBuilder, StorageError, StorageItem, TagValue, Tags};

mod memory;
pub use memory::InMemoryStorage;

mod repository;
pub use repository::Repository;
