use std::collections::HashMap;

use tokio::sync::RwLock;

use cartstore_core::errors::InventoryError;
use cartstore_core::ports::InventoryClient;
use cartstore_core::{Product, ProductId, StockInfo};

/// Catalog and stock levels held in memory. Unknown ids answer `NotFound`.
#[derive(Default)]
pub struct InMemoryInventory {
    products: RwLock<HashMap<ProductId, Product>>,
    stock: RwLock<HashMap<ProductId, u32>>,
}

impl InMemoryInventory {
    pub async fn put_product(&self, product: Product, stock: u32) {
        let id = product.id;
        self.products.write().await.insert(id, product);
        self.stock.write().await.insert(id, stock);
    }

    pub async fn set_stock(&self, id: ProductId, amount: u32) {
        self.stock.write().await.insert(id, amount);
    }
}

#[async_trait::async_trait]
impl InventoryClient for InMemoryInventory {
    async fn get_product(&self, id: ProductId) -> Result<Product, InventoryError> {
        let products = self.products.read().await;
        products.get(&id).cloned().ok_or(InventoryError::NotFound(id))
    }

    async fn get_stock(&self, id: ProductId) -> Result<StockInfo, InventoryError> {
        let stock = self.stock.read().await;
        stock
            .get(&id)
            .map(|amount| StockInfo { id, amount: *amount })
            .ok_or(InventoryError::NotFound(id))
    }
}
