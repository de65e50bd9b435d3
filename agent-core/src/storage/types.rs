use std::collections::BTreeMap;
use std::fmt::Debug;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

/// `StorageError` is a base error types for the record store
#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub enum StorageError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("record duplicate: {0}")]
    RecordDuplicate(String),

    #[error("record conflict: {0}")]
    RecordConflict(String),

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("backend error: {0}")]
    BackendError(String),
}

/// `TagValue` is a queryable projection of a record field
///
/// A [`TagValue::Multi`] tag matches a query when it contains the queried value,
/// it is used to index list fields like the mediator's recipient keys
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(untagged)]
pub enum TagValue {
    Single(String),
    Multi(Vec<String>),
}

impl TagValue {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TagValue::Single(single) => single == value,
            TagValue::Multi(values) => values.iter().any(|val| val == value),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            TagValue::Single(single) => vec![single.to_owned()],
            TagValue::Multi(values) => values.to_owned(),
        }
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Single(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for TagValue {
    fn from(value: Vec<String>) -> Self {
        TagValue::Multi(value)
    }
}

pub type Tags = BTreeMap<String, TagValue>;

/// `Query` is a conjunction of tag equality filters
///
/// Entries given with a `None` value are skipped, which mirrors a lookup by
/// `(threadId, connectionId)` where the connection is absent for connection-less exchanges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    entries: BTreeMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.entries.insert(name.to_string(), value.into());
        self
    }

    pub fn with_opt<T: Into<String>>(mut self, name: &str, value: Option<T>) -> Self {
        if let Some(val) = value {
            self.entries.insert(name.to_string(), val.into());
        }

        self
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        self.entries.iter().all(|(name, value)| {
            tags.get(name)
                .map(|tag| tag.matches(value))
                .unwrap_or(false)
        })
    }
}

/// `StorageItem` is the backend representation of a record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct StorageItem {
    pub record_type: String,
    pub id: String,
    pub value: Value,
    pub tags: Tags,
    pub version: u64,
}

/// `Record` must be implemented by every persisted entity
///
/// The tags returned by [`Record::get_tags`] are recomputed on each write, so they always
/// reflect the current record fields
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_type() -> &'static str;
    fn get_id(&self) -> String;
    fn get_tags(&self) -> Tags;
    fn get_version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// `StorageBuilder` is a record store backend abstraction
///
/// `update` receives the item carrying the version the caller read. The backend must reject
/// the write with [`StorageError::RecordConflict`] when the stored version moved, and returns
/// the new version on success
#[async_trait]
pub trait StorageBuilder: Clone + Send + Sync + 'static {
    async fn insert(&self, item: StorageItem) -> Result<(), StorageError>;
    async fn update(&self, item: StorageItem) -> Result<u64, StorageError>;
    async fn get(&self, record_type: String, id: String)
        -> Result<Option<StorageItem>, StorageError>;
    async fn delete(&self, record_type: String, id: String) -> Result<(), StorageError>;
    async fn query(&self, record_type: String, query: Query)
        -> Result<Vec<StorageItem>, StorageError>;
}
