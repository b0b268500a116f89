//! In-memory access projection store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use advocase_application::{AccessProjectionRepository, AccessRecordKey, CaseAccessRecord};
use advocase_core::AppResult;

/// In-memory keyed record store behind the projection repository port.
#[derive(Default)]
pub struct InMemoryAccessProjectionRepository {
    records: RwLock<HashMap<AccessRecordKey, CaseAccessRecord>>,
}

impl InMemoryAccessProjectionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether the repository holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AccessProjectionRepository for InMemoryAccessProjectionRepository {
    async fn get(&self, key: &AccessRecordKey) -> AppResult<Option<CaseAccessRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: CaseAccessRecord) -> AppResult<()> {
        debug!(key = %record.key, "access record stored");
        self.records.write().await.insert(record.key, record);
        Ok(())
    }

    async fn delete(&self, key: &AccessRecordKey) -> AppResult<()> {
        debug!(key = %key, "access record deleted");
        self.records.write().await.remove(key);
        Ok(())
    }
}
