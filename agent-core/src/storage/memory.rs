use std::collections::HashMap;
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_tokio::tokio::sync::RwLock;

use super::types::{Query, StorageBuilder, StorageError, StorageItem};

#[derive(Default)]
struct Entries {
    sequence: u64,
    items: HashMap<(String, String), (u64, StorageItem)>,
}

/// `InMemoryStorage` keeps records in a process local map
///
/// Query results are returned in insertion order
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBuilder for InMemoryStorage {
    async fn insert(&self, item: StorageItem) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let key = (item.record_type.to_owned(), item.id.to_owned());
        if entries.items.contains_key(&key) {
            return Err(StorageError::RecordDuplicate(format!(
                "{} with id {} already exists",
                item.record_type, item.id
            )));
        }

        entries.sequence += 1;
        let sequence = entries.sequence;
        entries.items.insert(key, (sequence, item));
        Ok(())
    }

    async fn update(&self, item: StorageItem) -> Result<u64, StorageError> {
        let mut entries = self.entries.write().await;
        let key = (item.record_type.to_owned(), item.id.to_owned());

        let (sequence, current) = entries.items.get(&key).cloned().ok_or_else(|| {
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
        entries.items.insert(key, (sequence, next));

        Ok(next_version)
    }

    async fn get(
        &self,
        record_type: String,
        id: String,
    ) -> Result<Option<StorageItem>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .items
            .get(&(record_type, id))
            .map(|(_, item)| item.to_owned()))
    }

    async fn delete(&self, record_type: String, id: String) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries
            .items
            .remove(&(record_type.to_owned(), id.to_owned()))
            .map(|_| ())
            .ok_or(StorageError::RecordNotFound(format!(
                "{} with id {}",
                record_type, id
            )))
    }

    async fn query(
        &self,
        record_type: String,
        query: Query,
    ) -> Result<Vec<StorageItem>, StorageError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<(u64, StorageItem)> = entries
            .items
            .values()
            .filter(|(_, item)| item.record_type == record_type && query.matches(&item.tags))
            .cloned()
            .collect();

        matched.sort_by_key(|(sequence, _)| *sequence);
        Ok(matched.into_iter().map(|(_, item)| item).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use crate::storage::types::{TagValue, Tags};

    fn build_item(id: &str, state: &str) -> StorageItem {
        let mut tags = Tags::new();
        tags.insert("state".to_string(), TagValue::from(state));

        StorageItem {
            record_type: "FakeRecord".to_string(),
            id: id.to_string(),
            value: json!({"id": id}),
            tags,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_insert_duplicate() {
        let storage = InMemoryStorage::new();
        let insert = storage.insert(build_item("1", "init")).await;
        assert!(!insert.is_err());

        let duplicate = storage.insert(build_item("1", "init")).await;
        assert!(matches!(
            duplicate.unwrap_err(),
            StorageError::RecordDuplicate(_)
        ))
    }

    #[tokio::test]
    async fn test_update_conflict() {
        let storage = InMemoryStorage::new();
        let _ = storage.insert(build_item("1", "init")).await;

        let first = storage.update(build_item("1", "done")).await;
        assert_eq!(first.unwrap(), 2);

        let stale = storage.update(build_item("1", "declined")).await;
        assert!(matches!(stale.unwrap_err(), StorageError::RecordConflict(_)));

        let stored = storage
            .get("FakeRecord".to_string(), "1".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tags.get("state"), Some(&TagValue::from("done")));
    }

    #[tokio::test]
    async fn test_query_insertion_order() {
        let storage = InMemoryStorage::new();
        let _ = storage.insert(build_item("b", "init")).await;
        let _ = storage.insert(build_item("a", "init")).await;
        let _ = storage.insert(build_item("c", "done")).await;

        let items = storage
            .query("FakeRecord".to_string(), Query::new().with("state", "init"))
            .await
            .unwrap();

        let ids: Vec<String> = items.into_iter().map(|item| item.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let storage = InMemoryStorage::new();
        let removed = storage
            .delete("FakeRecord".to_string(), "1".to_string())
            .await;
        assert!(matches!(removed.unwrap_err(), StorageError::RecordNotFound(_)))
    }
}
