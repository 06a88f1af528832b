use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::broadcast::error::TryRecvError;

use cartstore_core::config::CartPolicy;
use cartstore_core::{
    Cart, CartItem, CartStore, CartStoreSettings, InMemoryNotificationSink, InventoryClient,
    InventoryError, KeyValueStore, Notice, Product, ProductId, StockInfo, StorageError,
    UpdateProductAmount,
};

const CART_KEY: &str = "cart";

#[derive(Default)]
struct ScriptedInventory {
    stock: Mutex<HashMap<u64, u32>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInventory {
    fn with_stock(levels: &[(u64, u32)]) -> Arc<Self> {
        let inventory = Self::default();
        if let Ok(mut stock) = inventory.stock.lock() {
            stock.extend(levels.iter().copied());
        }
        Arc::new(inventory)
    }

    fn set_stock(&self, id: u64, amount: u32) {
        if let Ok(mut stock) = self.stock.lock() {
            stock.insert(id, amount);
        }
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<(), InventoryError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(InventoryError::Network("connection refused".to_owned()));
        }
        Ok(())
    }

    fn level(&self, id: ProductId) -> Result<u32, InventoryError> {
        let stock = self.stock.lock().map_err(|_| InventoryError::Network("poisoned".into()))?;
        stock.get(&id.0).copied().ok_or(InventoryError::NotFound(id))
    }
}

#[async_trait]
impl InventoryClient for ScriptedInventory {
    async fn get_product(&self, id: ProductId) -> Result<Product, InventoryError> {
        self.record(format!("products/{id}"))?;
        self.level(id)?;
        Ok(product(id.0))
    }

    async fn get_stock(&self, id: ProductId) -> Result<StockInfo, InventoryError> {
        self.record(format!("stock/{id}"))?;
        Ok(StockInfo { id, amount: self.level(id)? })
    }
}

#[derive(Default)]
struct MemoryStorage {
    values: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    fn seeded(items: &[(u64, u32)]) -> Arc<Self> {
        let storage = Self::default();
        let cart = Cart::new(
            items.iter().map(|(id, amount)| CartItem::new(product(*id), *amount)).collect(),
        );
        let bytes = serde_json::to_vec(&cart).expect("serialize seed cart");
        storage.values.lock().expect("storage lock").insert(CART_KEY.to_owned(), bytes);
        Arc::new(storage)
    }

    fn persisted(&self) -> Option<Cart> {
        let values = self.values.lock().expect("storage lock");
        values.get(CART_KEY).map(|bytes| serde_json::from_slice(bytes).expect("persisted cart"))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("read failed".to_owned()));
        }
        Ok(self.values.lock().expect("storage lock").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".to_owned()));
        }
        self.values.lock().expect("storage lock").insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

fn product(id: u64) -> Product {
    Product {
        id: ProductId(id),
        title: format!("Running shoe {id}"),
        price: Decimal::new(13990 + id as i64, 2),
        image: format!("https://cdn.example.com/shoes/{id}.jpg"),
    }
}

fn amounts(cart: &Cart) -> Vec<(u64, u32)> {
    cart.items().iter().map(|item| (item.id().0, item.amount)).collect()
}

struct Harness {
    store: CartStore,
    inventory: Arc<ScriptedInventory>,
    storage: Arc<MemoryStorage>,
    sink: InMemoryNotificationSink,
}

async fn harness(
    inventory: Arc<ScriptedInventory>,
    storage: Arc<MemoryStorage>,
    policy: CartPolicy,
) -> Harness {
    let sink = InMemoryNotificationSink::default();
    let store = CartStore::load(
        inventory.clone(),
        storage.clone(),
        Arc::new(sink.clone()),
        CartStoreSettings { cart_key: CART_KEY.to_owned(), policy },
    )
    .await
    .expect("store should load");
    Harness { store, inventory, storage, sink }
}

#[tokio::test]
async fn adding_new_product_with_stock_creates_single_entry() {
    let h = harness(ScriptedInventory::with_stock(&[(1, 5)]), Arc::default(), CartPolicy::default())
        .await;

    h.store.add_product(ProductId(1)).await;

    let cart = h.store.cart().await;
    assert_eq!(amounts(&cart), vec![(1, 1)]);
    assert_eq!(cart.items()[0].product, product(1));
    assert_eq!(h.storage.persisted(), Some(cart));
    assert!(h.sink.notices().is_empty());
    assert_eq!(h.inventory.calls(), vec!["products/1", "stock/1"]);
}

#[tokio::test]
async fn adding_existing_product_increments_only_that_entry() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 9), (2, 9)]),
        MemoryStorage::seeded(&[(1, 2), (2, 1)]),
        CartPolicy::default(),
    )
    .await;

    h.store.add_product(ProductId(1)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 3), (2, 1)]);
    assert_eq!(h.storage.persisted().map(|cart| amounts(&cart)), Some(vec![(1, 3), (2, 1)]));
    assert_eq!(h.inventory.calls(), vec!["stock/1"], "existing entries only need a stock check");
}

#[tokio::test]
async fn adding_existing_product_at_stock_limit_emits_out_of_stock() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 2)]),
        MemoryStorage::seeded(&[(1, 2)]),
        CartPolicy::default(),
    )
    .await;

    h.store.add_product(ProductId(1)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 2)]);
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock]);
}

#[tokio::test]
async fn adding_unavailable_new_product_is_silent_by_default() {
    let h = harness(ScriptedInventory::with_stock(&[(4, 0)]), Arc::default(), CartPolicy::default())
        .await;

    h.store.add_product(ProductId(4)).await;

    assert!(h.store.cart().await.is_empty());
    assert!(h.storage.persisted().is_none(), "nothing should be written");
    assert!(
        h.sink.notices().is_empty(),
        "unavailable new products are not announced unless the policy asks for it"
    );
}

#[tokio::test]
async fn adding_unavailable_new_product_notifies_when_policy_enabled() {
    let h = harness(
        ScriptedInventory::with_stock(&[(4, 0)]),
        Arc::default(),
        CartPolicy { notify_unavailable_new_product: true },
    )
    .await;

    h.store.add_product(ProductId(4)).await;

    assert!(h.store.cart().await.is_empty());
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock]);
}

#[tokio::test]
async fn add_inventory_failure_reports_add_failed_and_keeps_cart() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 5)]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;
    h.inventory.go_offline();

    h.store.add_product(ProductId(1)).await;
    h.store.add_product(ProductId(2)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1)]);
    assert_eq!(h.sink.notices(), vec![Notice::AddFailed, Notice::AddFailed]);
}

#[tokio::test]
async fn add_unknown_product_reports_add_failed() {
    let h = harness(ScriptedInventory::with_stock(&[]), Arc::default(), CartPolicy::default()).await;

    h.store.add_product(ProductId(404)).await;

    assert!(h.store.cart().await.is_empty());
    assert_eq!(h.sink.notices(), vec![Notice::AddFailed]);
}

#[tokio::test]
async fn add_storage_failure_leaves_memory_and_storage_untouched() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 5)]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;
    h.storage.fail_writes.store(true, Ordering::SeqCst);

    h.store.add_product(ProductId(1)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1)]);
    assert_eq!(h.storage.persisted().map(|cart| amounts(&cart)), Some(vec![(1, 1)]));
    assert_eq!(h.sink.notices(), vec![Notice::AddFailed]);
}

#[tokio::test]
async fn removing_present_product_drops_only_that_entry() {
    let h = harness(
        ScriptedInventory::with_stock(&[]),
        MemoryStorage::seeded(&[(1, 1), (2, 3), (3, 2)]),
        CartPolicy::default(),
    )
    .await;

    h.store.remove_product(ProductId(2)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1), (3, 2)]);
    assert_eq!(h.storage.persisted().map(|cart| amounts(&cart)), Some(vec![(1, 1), (3, 2)]));
    assert!(h.sink.notices().is_empty());
    assert!(h.inventory.calls().is_empty(), "removal never consults inventory");
}

#[tokio::test]
async fn removing_absent_product_emits_remove_failed() {
    let h = harness(ScriptedInventory::with_stock(&[]), Arc::default(), CartPolicy::default()).await;

    h.store.remove_product(ProductId(99)).await;

    assert!(h.store.cart().await.is_empty());
    assert!(h.storage.persisted().is_none());
    assert_eq!(h.sink.notices(), vec![Notice::RemoveFailed]);
}

#[tokio::test]
async fn remove_storage_failure_reports_remove_failed() {
    let h = harness(
        ScriptedInventory::with_stock(&[]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;
    h.storage.fail_writes.store(true, Ordering::SeqCst);

    h.store.remove_product(ProductId(1)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1)]);
    assert_eq!(h.sink.notices(), vec![Notice::RemoveFailed]);
}

#[tokio::test]
async fn updating_within_stock_sets_exact_amount() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 10)]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 5 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 5)]);
    assert_eq!(h.storage.persisted().map(|cart| amounts(&cart)), Some(vec![(1, 5)]));
    assert!(h.sink.notices().is_empty());
}

#[tokio::test]
async fn updating_to_exact_stock_level_is_allowed() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 4), (2, 8)]),
        MemoryStorage::seeded(&[(1, 3), (2, 2)]),
        CartPolicy::default(),
    )
    .await;

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 4 }).await;
    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 2 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 2), (2, 2)]);
}

#[tokio::test]
async fn updating_above_stock_emits_out_of_stock() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 3)]),
        MemoryStorage::seeded(&[(1, 2)]),
        CartPolicy::default(),
    )
    .await;

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 4 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 2)]);
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock]);
}

#[tokio::test]
async fn updating_below_one_is_silently_rejected() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 10), (2, 10)]),
        MemoryStorage::seeded(&[(1, 1), (2, 3)]),
        CartPolicy::default(),
    )
    .await;

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 0 }).await;
    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(2), amount: 0 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1), (2, 3)]);
    assert!(h.sink.notices().is_empty(), "the quantity floor is enforced without a notice");
}

#[tokio::test]
async fn updating_product_not_in_cart_is_silent_but_still_checks_stock() {
    let h = harness(
        ScriptedInventory::with_stock(&[(7, 10)]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(7), amount: 2 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1)]);
    assert!(h.sink.notices().is_empty());
    assert_eq!(h.inventory.calls(), vec!["stock/7"]);
}

#[tokio::test]
async fn update_inventory_failure_reports_update_failed() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 10)]),
        MemoryStorage::seeded(&[(1, 1)]),
        CartPolicy::default(),
    )
    .await;
    h.inventory.go_offline();

    h.store.update_product_amount(UpdateProductAmount { product_id: ProductId(1), amount: 2 }).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 1)]);
    assert_eq!(h.sink.notices(), vec![Notice::UpdateFailed]);
}

#[tokio::test]
async fn stock_drop_does_not_truncate_existing_quantity() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 5)]),
        MemoryStorage::seeded(&[(1, 4)]),
        CartPolicy::default(),
    )
    .await;
    h.inventory.set_stock(1, 1);

    h.store.add_product(ProductId(1)).await;

    assert_eq!(amounts(&h.store.cart().await), vec![(1, 4)]);
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock]);
}

#[tokio::test]
async fn persisted_cart_is_restored_by_the_next_session() {
    let inventory = ScriptedInventory::with_stock(&[(3, 5), (1, 5), (2, 5)]);
    let storage: Arc<MemoryStorage> = Arc::default();
    let first = harness(inventory.clone(), storage.clone(), CartPolicy::default()).await;

    for id in [3, 1, 2, 1] {
        first.store.add_product(ProductId(id)).await;
    }
    let before = first.store.cart().await;

    let second = harness(inventory, storage, CartPolicy::default()).await;

    assert_eq!(second.store.cart().await, before);
    assert_eq!(amounts(&before), vec![(3, 1), (1, 2), (2, 1)]);
}

#[tokio::test]
async fn unparseable_persisted_value_starts_with_empty_cart() {
    let storage = MemoryStorage::default();
    storage.values.lock().expect("storage lock").insert(CART_KEY.to_owned(), b"{not json".to_vec());

    let h = harness(ScriptedInventory::with_stock(&[]), Arc::new(storage), CartPolicy::default())
        .await;

    assert!(h.store.cart().await.is_empty());
    assert!(h.sink.notices().is_empty());
}

#[tokio::test]
async fn load_propagates_storage_read_failure() {
    let storage = MemoryStorage::default();
    storage.fail_reads.store(true, Ordering::SeqCst);

    let result = CartStore::load(
        ScriptedInventory::with_stock(&[]),
        Arc::new(storage),
        Arc::new(InMemoryNotificationSink::default()),
        CartStoreSettings::default(),
    )
    .await;

    assert!(matches!(result, Err(StorageError::Backend(_))));
}

#[tokio::test]
async fn subscribers_see_committed_snapshots_only() {
    let h = harness(
        ScriptedInventory::with_stock(&[(1, 1)]),
        Arc::default(),
        CartPolicy::default(),
    )
    .await;
    let mut changes = h.store.subscribe();

    h.store.add_product(ProductId(1)).await;
    let committed = changes.try_recv().expect("add should publish the new cart");
    assert_eq!(amounts(&committed), vec![(1, 1)]);

    h.store.add_product(ProductId(1)).await;
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock]);
}

#[tokio::test]
async fn clear_empties_and_persists_the_cart() {
    let h = harness(
        ScriptedInventory::with_stock(&[]),
        MemoryStorage::seeded(&[(1, 1), (2, 2)]),
        CartPolicy::default(),
    )
    .await;

    h.store.clear().await;

    assert!(h.store.cart().await.is_empty());
    assert_eq!(h.storage.persisted(), Some(Cart::default()));
}

#[tokio::test]
async fn shared_store_serializes_concurrent_adds() {
    let inventory = ScriptedInventory::with_stock(&[(1, 3)]);
    let h = harness(inventory, Arc::default(), CartPolicy::default()).await;
    let store = Arc::new(h.store);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.add_product(ProductId(1)).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("add task");
    }

    assert_eq!(amounts(&store.cart().await), vec![(1, 3)]);
    assert_eq!(h.sink.notices(), vec![Notice::OutOfStock, Notice::OutOfStock]);
}
