//! Traits for the collaborators a [`CartStore`](crate::store::CartStore) reads from and writes to.

use async_trait::async_trait;

use crate::domain::product::{Product, ProductId, StockInfo};
use crate::errors::{InventoryError, StorageError};

/// Read-only access to catalog metadata and live stock levels.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Product, InventoryError>;
    async fn get_stock(&self, id: ProductId) -> Result<StockInfo, InventoryError>;
}

/// Durable byte store keyed by string, surviving process restarts.
///
/// `set` must replace the whole value or fail without writing.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}
