use chrono::Utc;
use tracing::debug;

use cartstore_core::errors::StorageError;
use cartstore_core::ports::KeyValueStore;

use super::RepositoryError;
use crate::DbPool;

/// SQLite-backed key-value store. Each `set` is a single upsert, so a value is
/// either fully replaced or left as it was.
pub struct SqlKeyValueStore {
    pool: DbPool,
}

impl SqlKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn upsert(&self, key: &str, value: &[u8]) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self.fetch(key).await?;
        debug!(event_name = "storage.kv.get", key, found = value.is_some(), "kv value read");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.upsert(key, value).await?;
        debug!(event_name = "storage.kv.set", key, bytes = value.len(), "kv value written");
        Ok(())
    }
}
