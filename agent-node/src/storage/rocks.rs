use std::collections::BTreeSet;
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json;
use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::sync::Mutex;

use rstdev_storage::engine::rocksdb::db::DB;

use prople_agent_core::storage::{Query, StorageBuilder, StorageError, StorageItem};

use super::index::RecordIndex;
use super::runner::Runner;
use super::types::{DbError, Instruction, OutputOpts};

fn record_key(record_type: &str, id: &str) -> String {
    format!("record:{}:{}", record_type, id)
}

fn index_key(record_type: &str) -> String {
    format!("index:{}", record_type)
}

fn tag_key(record_type: &str, name: &str, value: &str) -> String {
    format!("index:{}:{}:{}", record_type, name, value)
}

fn tag_keys(item: &StorageItem) -> BTreeSet<String> {
    item.tags
        .iter()
        .flat_map(|(name, value)| {
            value
                .values()
                .into_iter()
                .map(move |val| tag_key(&item.record_type, name, &val))
        })
        .collect()
}

/// `RocksStorage` is the [`StorageBuilder`] backed by a rocksdb column family
///
/// Each record type keeps an ordered bucket of ids under `index:{type}` and one bucket per
/// tag value under `index:{type}:{tag}:{value}`. Writes are serialized through a single
/// lock, the version check and the index updates must observe the same state.
#[derive(Clone)]
pub struct RocksStorage {
    runner: Runner<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksStorage {
    pub fn new(runner: Runner<DB>, write_lock: Arc<Mutex<()>>) -> Self {
        Self { runner, write_lock }
    }

    async fn load_item(
        &self,
        record_type: &str,
        id: &str,
    ) -> Result<Option<StorageItem>, StorageError> {
        let output = self
            .runner
            .exec(Instruction::GetCf {
                key: record_key(record_type, id),
            })
            .await?;

        match output {
            OutputOpts::SingleByte { value: Some(bytes) } => {
                let item: StorageItem = serde_json::from_slice(&bytes)
                    .map_err(|err| StorageError::SerializeError(err.to_string()))?;
                Ok(Some(item))
            }
            _ => Ok(None),
        }
    }

    async fn save_item(&self, item: &StorageItem) -> Result<(), StorageError> {
        let value = serde_json::to_vec(item)
            .map_err(|err| StorageError::SerializeError(err.to_string()))?;

        self.runner
            .exec(Instruction::SaveCf {
                key: record_key(&item.record_type, &item.id),
                value,
            })
            .await?;

        Ok(())
    }

    async fn load_bucket(&self, key: String) -> Result<RecordIndex, StorageError> {
        let output = self.runner.exec(Instruction::GetCf { key }).await?;
        match output {
            OutputOpts::SingleByte { value: Some(bytes) } => {
                let index: RecordIndex = bytes.try_into()?;
                Ok(index)
            }
            _ => Ok(RecordIndex::new()),
        }
    }

    async fn save_bucket(&self, key: String, index: RecordIndex) -> Result<(), StorageError> {
        if index.ids().is_empty() {
            self.runner.exec(Instruction::RemoveCf { key }).await?;
            return Ok(());
        }

        let value: Vec<u8> = index.try_into()?;
        self.runner.exec(Instruction::SaveCf { key, value }).await?;
        Ok(())
    }

    async fn add_to_bucket(&self, key: String, id: &str) -> Result<(), StorageError> {
        let mut index = self.load_bucket(key.to_owned()).await?;
        index.add(id.to_string());
        self.save_bucket(key, index).await
    }

    async fn remove_from_bucket(&self, key: String, id: &str) -> Result<(), StorageError> {
        let mut index = self.load_bucket(key.to_owned()).await?;
        index.remove(id);
        self.save_bucket(key, index).await
    }
}

#[async_trait]
impl StorageBuilder for RocksStorage {
    async fn insert(&self, item: StorageItem) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        if self.load_item(&item.record_type, &item.id).await?.is_some() {
            return Err(StorageError::RecordDuplicate(format!(
                "{} with id {} already exists",
                item.record_type, item.id
            )));
        }

        self.save_item(&item).await?;
        self.add_to_bucket(index_key(&item.record_type), &item.id)
            .await?;

        for key in tag_keys(&item) {
            self.add_to_bucket(key, &item.id).await?;
        }

        debug!("storage: inserted {} {}", item.record_type, item.id);
        Ok(())
    }

    async fn update(&self, item: StorageItem) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock().await;

        let current = self
            .load_item(&item.record_type, &item.id)
            .await?
            .ok_or_else(|| {
                StorageError::RecordNotFound(format!("{} with id {}", item.record_type, item.id))
            })?;

        if current.version != item.version {
            return Err(StorageError::RecordConflict(format!(
                "{} with id {} moved from version {} to {}",
                item.record_type, item.id, item.version, current.version
            )));
        }

        let next_version = current.version + 1;
        let mut next = item;
        next.version = next_version;
        self.save_item(&next).await?;

        let previous_keys = tag_keys(&current);
        let next_keys = tag_keys(&next);
        for key in previous_keys.difference(&next_keys) {
            self.remove_from_bucket(key.to_owned(), &next.id).await?;
        }

        for key in next_keys.difference(&previous_keys) {
            self.add_to_bucket(key.to_owned(), &next.id).await?;
        }

        Ok(next_version)
    }

    async fn get(
        &self,
        record_type: String,
        id: String,
    ) -> Result<Option<StorageItem>, StorageError> {
        self.load_item(&record_type, &id).await
    }

    async fn delete(&self, record_type: String, id: String) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let current = self.load_item(&record_type, &id).await?.ok_or_else(|| {
            StorageError::RecordNotFound(format!("{} with id {}", record_type, id))
        })?;

        self.runner
            .exec(Instruction::RemoveCf {
                key: record_key(&record_type, &id),
            })
            .await?;

        self.remove_from_bucket(index_key(&record_type), &id).await?;
        for key in tag_keys(&current) {
            self.remove_from_bucket(key, &id).await?;
        }

        debug!("storage: deleted {} {}", record_type, id);
        Ok(())
    }

    /// candidates come from the tag buckets, the type bucket gives the insertion order
    async fn query(
        &self,
        record_type: String,
        query: Query,
    ) -> Result<Vec<StorageItem>, StorageError> {
        let index = self.load_bucket(index_key(&record_type)).await?;
        let mut ids = index.ids().to_owned();

        for (name, value) in query.entries() {
            if ids.is_empty() {
                break;
            }

            let bucket = self
                .load_bucket(tag_key(&record_type, name, value))
                .await?;
            ids.retain(|id| bucket.ids().contains(id));
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = ids.iter().map(|id| record_key(&record_type, id)).collect();
        let values = match self.runner.exec(Instruction::MultiGetCf { keys }).await? {
            OutputOpts::MultiBytes { values } => values,
            _ => {
                return Err(
                    DbError::InstanceError("unexpected multi get output".to_string()).into(),
                )
            }
        };

        let mut items = Vec::new();
        for value in values {
            let bytes = match value? {
                Some(bytes) => bytes,
                None => continue,
            };

            let item: StorageItem = serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::SerializeError(err.to_string()))?;

            if query.matches(&item.tags) {
                items.push(item);
            }
        }

        Ok(items)
    }
}
