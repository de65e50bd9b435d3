use std::marker::PhantomData;

use rst_common::standard::serde_json;

use super::types::{Query, Record, StorageBuilder, StorageError, StorageItem};

/// `Repository` is a typed view of a [`StorageBuilder`] for one record type
///
/// Every method works on detached clones, callers never share a mutable reference to a
/// stored record
pub struct Repository<TStorage, TRecord>
where
    TStorage: StorageBuilder,
    TRecord: Record,
{
    storage: TStorage,
    _record: PhantomData<TRecord>,
}

impl<TStorage, TRecord> Clone for Repository<TStorage, TRecord>
where
    TStorage: StorageBuilder,
    TRecord: Record,
{
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            _record: PhantomData,
        }
    }
}

impl<TStorage, TRecord> Repository<TStorage, TRecord>
where
    TStorage: StorageBuilder,
    TRecord: Record,
{
    pub fn new(storage: TStorage) -> Self {
        Self {
            storage,
            _record: PhantomData,
        }
    }

    fn to_item(record: &TRecord) -> Result<StorageItem, StorageError> {
        let value = serde_json::to_value(record)
            .map_err(|err| StorageError::SerializeError(err.to_string()))?;

        Ok(StorageItem {
            record_type: TRecord::record_type().to_string(),
            id: record.get_id(),
            value,
            tags: record.get_tags(),
            version: record.get_version(),
        })
    }

    fn from_item(item: StorageItem) -> Result<TRecord, StorageError> {
        let mut record: TRecord = serde_json::from_value(item.value)
            .map_err(|err| StorageError::SerializeError(err.to_string()))?;

        record.set_version(item.version);
        Ok(record)
    }

    fn from_items(items: Vec<StorageItem>) -> Result<Vec<TRecord>, StorageError> {
        items.into_iter().map(Self::from_item).collect()
    }

    /// `save` persists a new record and returns it with its initial version
    pub async fn save(&self, record: &TRecord) -> Result<TRecord, StorageError> {
        let mut saved = record.clone();
        saved.set_version(1);

        let item = Self::to_item(&saved)?;
        self.storage.insert(item).await?;
        Ok(saved)
    }

    /// `update` writes the record if nobody else updated it since it was read
    pub async fn update(&self, record: &TRecord) -> Result<TRecord, StorageError> {
        let item = Self::to_item(record)?;
        let version = self.storage.update(item).await?;

        let mut updated = record.clone();
        updated.set_version(version);
        Ok(updated)
    }

    pub async fn delete(&self, record: &TRecord) -> Result<(), StorageError> {
        self.delete_by_id(record.get_id()).await
    }

    pub async fn delete_by_id(&self, id: String) -> Result<(), StorageError> {
        self.storage
            .delete(TRecord::record_type().to_string(), id)
            .await
    }

    pub async fn get_by_id(&self, id: String) -> Result<TRecord, StorageError> {
        self.find_by_id(id.to_owned()).await?.ok_or_else(|| {
            StorageError::RecordNotFound(format!(
                "{} with id {} not found",
                TRecord::record_type(),
                id
            ))
        })
    }

    pub async fn find_by_id(&self, id: String) -> Result<Option<TRecord>, StorageError> {
        let item = self
            .storage
            .get(TRecord::record_type().to_string(), id)
            .await?;

        item.map(Self::from_item).transpose()
    }

    pub async fn get_all(&self) -> Result<Vec<TRecord>, StorageError> {
        self.find_by_query(Query::new()).await
    }

    pub async fn find_by_query(&self, query: Query) -> Result<Vec<TRecord>, StorageError> {
        let items = self
            .storage
            .query(TRecord::record_type().to_string(), query)
            .await?;

        Self::from_items(items)
    }

    /// `get_single_by_query` fails when zero or more than one record matched
    pub async fn get_single_by_query(&self, query: Query) -> Result<TRecord, StorageError> {
        self.find_single_by_query(query.clone())
            .await?
            .ok_or_else(|| {
                StorageError::RecordNotFound(format!(
                    "{} not found for query {:?}",
                    TRecord::record_type(),
                    query.entries()
                ))
            })
    }

    /// `find_single_by_query` fails only when more than one record matched
    pub async fn find_single_by_query(
        &self,
        query: Query,
    ) -> Result<Option<TRecord>, StorageError> {
        let mut records = self.find_by_query(query.clone()).await?;
        if records.len() > 1 {
            return Err(StorageError::RecordDuplicate(format!(
                "{} records of type {} found for query {:?}",
                records.len(),
                TRecord::record_type(),
                query.entries()
            )));
        }

        Ok(records.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde::{self, Deserialize, Serialize};
    use rst_common::with_tokio::tokio;

    use crate::storage::types::{TagValue, Tags};
    use crate::storage::InMemoryStorage;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(crate = "self::serde")]
    struct FakeRecord {
        id: String,
        thread_id: String,
        state: String,
        version: u64,
    }

    impl FakeRecord {
        fn new(id: &str, thread_id: &str) -> Self {
            Self {
                id: id.to_string(),
                thread_id: thread_id.to_string(),
                state: "init".to_string(),
                version: 0,
            }
        }
    }

    impl Record for FakeRecord {
        fn record_type() -> &'static str {
            "FakeRecord"
        }

        fn get_id(&self) -> String {
            self.id.to_owned()
        }

        fn get_tags(&self) -> Tags {
            let mut tags = Tags::new();
            tags.insert("threadId".to_string(), TagValue::from(self.thread_id.to_owned()));
            tags.insert("state".to_string(), TagValue::from(self.state.to_owned()));
            tags
        }

        fn get_version(&self) -> u64 {
            self.version
        }

        fn set_version(&mut self, version: u64) {
            self.version = version
        }
    }

    fn generate_repo() -> Repository<InMemoryStorage, FakeRecord> {
        Repository::new(InMemoryStorage::new())
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = generate_repo();
        let saved = repo.save(&FakeRecord::new("1", "thread-1")).await;
        assert!(!saved.is_err());
        assert_eq!(saved.unwrap().version, 1);

        let record = repo.get_by_id("1".to_string()).await;
        assert!(!record.is_err());
        assert_eq!(record.unwrap().thread_id, "thread-1".to_string());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let repo = generate_repo();
        let record = repo.get_by_id("missing".to_string()).await;
        assert!(matches!(record.unwrap_err(), StorageError::RecordNotFound(_)))
    }

    #[tokio::test]
    async fn test_get_single_by_query() {
        let repo = generate_repo();
        let _ = repo.save(&FakeRecord::new("1", "thread-1")).await;
        let _ = repo.save(&FakeRecord::new("2", "thread-2")).await;
        let _ = repo.save(&FakeRecord::new("3", "thread-2")).await;

        let single = repo
            .get_single_by_query(Query::new().with("threadId", "thread-1"))
            .await;
        assert_eq!(single.unwrap().id, "1".to_string());

        let duplicate = repo
            .get_single_by_query(Query::new().with("threadId", "thread-2"))
            .await;
        assert!(matches!(
            duplicate.unwrap_err(),
            StorageError::RecordDuplicate(_)
        ));

        let missing = repo
            .get_single_by_query(Query::new().with("threadId", "thread-3"))
            .await;
        assert!(matches!(missing.unwrap_err(), StorageError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_detects_stale_snapshot() {
        let repo = generate_repo();
        let saved = repo.save(&FakeRecord::new("1", "thread-1")).await.unwrap();

        let mut first = saved.clone();
        first.state = "done".to_string();

        let mut second = saved.clone();
        second.state = "declined".to_string();

        let updated = repo.update(&first).await;
        assert!(!updated.is_err());
        assert_eq!(updated.unwrap().version, 2);

        let conflict = repo.update(&second).await;
        assert!(matches!(
            conflict.unwrap_err(),
            StorageError::RecordConflict(_)
        ));

        let stored = repo.get_by_id("1".to_string()).await.unwrap();
        assert_eq!(stored.state, "done".to_string());
    }

    #[tokio::test]
    async fn test_query_by_updated_tags() {
        let repo = generate_repo();
        let saved = repo.save(&FakeRecord::new("1", "thread-1")).await.unwrap();

        let mut next = saved.clone();
        next.state = "done".to_string();
        let _ = repo.update(&next).await;

        let done = repo
            .find_by_query(Query::new().with("state", "done"))
            .await
            .unwrap();
        assert_eq!(done.len(), 1);

        let init = repo
            .find_by_query(Query::new().with("state", "init"))
            .await
            .unwrap();
        assert!(init.is_empty());
    }
}
