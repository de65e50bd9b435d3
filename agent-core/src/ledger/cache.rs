use std::collections::HashMap;
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::sync::RwLock;

use super::types::{
    CredentialDefinition, LedgerBuilder, LedgerError, RevocationRegistry,
    RevocationRegistryDefinition, Schema,
};

#[derive(Default)]
struct Cache {
    schemas: HashMap<String, Schema>,
    cred_defs: HashMap<String, CredentialDefinition>,
    rev_reg_defs: HashMap<String, RevocationRegistryDefinition>,
    rev_regs: HashMap<(String, u64), RevocationRegistry>,
}

/// `CachedLedger` is a read-through cache in front of any [`LedgerBuilder`]
///
/// Ledger objects are immutable once written, so entries never expire. Failed reads are
/// not cached.
#[derive(Clone)]
pub struct CachedLedger {
    ledger: Arc<dyn LedgerBuilder>,
    cache: Arc<RwLock<Cache>>,
}

impl CachedLedger {
    pub fn new(ledger: Arc<dyn LedgerBuilder>) -> Self {
        Self {
            ledger,
            cache: Arc::new(RwLock::new(Cache::default())),
        }
    }
}

#[async_trait]
impl LedgerBuilder for CachedLedger {
    async fn get_schema(&self, id: String) -> Result<Schema, LedgerError> {
        if let Some(schema) = self.cache.read().await.schemas.get(&id) {
            return Ok(schema.to_owned());
        }

        debug!("ledger: fetch schema {}", id);
        let schema = self.ledger.get_schema(id.to_owned()).await?;
        self.cache.write().await.schemas.insert(id, schema.clone());
        Ok(schema)
    }

    async fn get_credential_definition(
        &self,
        id: String,
    ) -> Result<CredentialDefinition, LedgerError> {
        if let Some(cred_def) = self.cache.read().await.cred_defs.get(&id) {
            return Ok(cred_def.to_owned());
        }

        debug!("ledger: fetch credential definition {}", id);
        let cred_def = self.ledger.get_credential_definition(id.to_owned()).await?;
        self.cache
            .write()
            .await
            .cred_defs
            .insert(id, cred_def.clone());
        Ok(cred_def)
    }

    async fn get_revocation_registry_definition(
        &self,
        id: String,
    ) -> Result<RevocationRegistryDefinition, LedgerError> {
        if let Some(rev_reg_def) = self.cache.read().await.rev_reg_defs.get(&id) {
            return Ok(rev_reg_def.to_owned());
        }

        debug!("ledger: fetch revocation registry definition {}", id);
        let rev_reg_def = self
            .ledger
            .get_revocation_registry_definition(id.to_owned())
            .await?;
        self.cache
            .write()
            .await
            .rev_reg_defs
            .insert(id, rev_reg_def.clone());
        Ok(rev_reg_def)
    }

    async fn get_revocation_registry(
        &self,
        id: String,
        timestamp: u64,
    ) -> Result<RevocationRegistry, LedgerError> {
        let key = (id.to_owned(), timestamp);
        if let Some(rev_reg) = self.cache.read().await.rev_regs.get(&key) {
            return Ok(rev_reg.to_owned());
        }

        debug!("ledger: fetch revocation registry {} at {}", id, timestamp);
        let rev_reg = self.ledger.get_revocation_registry(id, timestamp).await?;
        self.cache.write().await.rev_regs.insert(key, rev_reg.clone());
        Ok(rev_reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::mock;
    use rst_common::with_tokio::tokio;

    mock!(
        FakeLedger{}

        #[async_trait]
        impl LedgerBuilder for FakeLedger {
            async fn get_schema(&self, id: String) -> Result<Schema, LedgerError>;
            async fn get_credential_definition(&self, id: String)
                -> Result<CredentialDefinition, LedgerError>;
            async fn get_revocation_registry_definition(
                &self,
                id: String,
            ) -> Result<RevocationRegistryDefinition, LedgerError>;
            async fn get_revocation_registry(
                &self,
                id: String,
                timestamp: u64,
            ) -> Result<RevocationRegistry, LedgerError>;
        }
    );

    fn build_schema(id: &str) -> Schema {
        Schema {
            id: id.to_string(),
            name: "faber".to_string(),
            version: "1.0".to_string(),
            attr_names: vec!["name".to_string(), "age".to_string()],
            seq_no: None,
        }
    }

    #[tokio::test]
    async fn test_schema_fetched_once() {
        let mut ledger = MockFakeLedger::new();
        ledger
            .expect_get_schema()
            .times(1)
            .returning(|id| Ok(build_schema(&id)));

        let cached = CachedLedger::new(Arc::new(ledger));
        for _ in 0..3 {
            let schema = cached.get_schema("schema-1".to_string()).await;
            assert!(!schema.is_err());
            assert_eq!(schema.unwrap().id, "schema-1".to_string());
        }
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let mut ledger = MockFakeLedger::new();
        ledger
            .expect_get_credential_definition()
            .times(2)
            .returning(|id| Err(LedgerError::NotFound(id)));

        let cached = CachedLedger::new(Arc::new(ledger));
        for _ in 0..2 {
            let cred_def = cached
                .get_credential_definition("cred-def-1".to_string())
                .await;
            assert!(matches!(cred_def.unwrap_err(), LedgerError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_revocation_registry_keyed_by_timestamp() {
        let mut ledger = MockFakeLedger::new();
        ledger
            .expect_get_revocation_registry()
            .times(2)
            .returning(|id, timestamp| {
                Ok(RevocationRegistry {
                    id,
                    timestamp,
                    revoked: Default::default(),
                })
            });

        let cached = CachedLedger::new(Arc::new(ledger));
        let _ = cached.get_revocation_registry("rev-1".to_string(), 10).await;
        let _ = cached.get_revocation_registry("rev-1".to_string(), 10).await;
        let later = cached.get_revocation_registry("rev-1".to_string(), 20).await;
        assert_eq!(later.unwrap().timestamp, 20);
    }
}
