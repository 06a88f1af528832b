use cartstore_core::errors::StorageError;
use thiserror::Error;

pub mod kv;
pub mod memory;

pub use kv::SqlKeyValueStore;
pub use memory::InMemoryKeyValueStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StorageError {
    fn from(value: RepositoryError) -> Self {
        StorageError::Backend(value.to_string())
    }
}
