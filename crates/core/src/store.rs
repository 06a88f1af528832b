//! The cart state container.
//!
//! `CartStore` owns the shopper's current [`Cart`], keeps a persisted copy in a
//! [`KeyValueStore`] and validates quantities against an [`InventoryClient`].
//!
//! Every public operation resolves to `()`. Failures never reach the caller:
//! they are reported through the [`NotificationSink`] and the cart is left
//! exactly as it was. A successful mutation is written to storage first and
//! only then committed in memory and broadcast to subscribers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{CartPolicy, DEFAULT_CART_KEY};
use crate::domain::cart::{Cart, CartItem};
use crate::domain::product::ProductId;
use crate::errors::{CartError, CartOperation, StorageError};
use crate::notify::NotificationSink;
use crate::ports::{InventoryClient, KeyValueStore};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductAmount {
    pub product_id: ProductId,
    pub amount: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartStoreSettings {
    pub cart_key: String,
    pub policy: CartPolicy,
}

impl Default for CartStoreSettings {
    fn default() -> Self {
        Self { cart_key: DEFAULT_CART_KEY.to_string(), policy: CartPolicy::default() }
    }
}

/// Outcome of planning an operation against the current cart.
enum Change {
    Commit(Cart),
    Unchanged { reason: &'static str },
}

pub struct CartStore {
    inventory: Arc<dyn InventoryClient>,
    storage: Arc<dyn KeyValueStore>,
    notifications: Arc<dyn NotificationSink>,
    settings: CartStoreSettings,
    cart: RwLock<Cart>,
    mutation: Mutex<()>,
    changes: broadcast::Sender<Cart>,
}

impl CartStore {
    /// Builds a store from the value persisted under `settings.cart_key`.
    ///
    /// A missing value yields an empty cart, as does a value that no longer
    /// parses. Only a failing storage read is an error.
    pub async fn load(
        inventory: Arc<dyn InventoryClient>,
        storage: Arc<dyn KeyValueStore>,
        notifications: Arc<dyn NotificationSink>,
        settings: CartStoreSettings,
    ) -> Result<Self, StorageError> {
        let cart = match storage.get(&settings.cart_key).await? {
            Some(bytes) => decode_cart(&settings.cart_key, &bytes),
            None => Cart::default(),
        };

        info!(
            event_name = "cart.store.loaded",
            cart_key = %settings.cart_key,
            items = cart.len(),
            "cart store initialized"
        );

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            inventory,
            storage,
            notifications,
            settings,
            cart: RwLock::new(cart),
            mutation: Mutex::new(()),
            changes,
        })
    }

    pub async fn cart(&self) -> Cart {
        self.cart.read().await.clone()
    }

    /// Receives the new cart after every committed mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<Cart> {
        self.changes.subscribe()
    }

    pub async fn add_product(&self, product_id: ProductId) {
        let _guard = self.mutation.lock().await;
        let correlation_id = Uuid::new_v4().to_string();
        let planned = self.plan_add(product_id).await;
        self.settle(CartOperation::Add, product_id, &correlation_id, planned).await;
    }

    pub async fn remove_product(&self, product_id: ProductId) {
        let _guard = self.mutation.lock().await;
        let correlation_id = Uuid::new_v4().to_string();
        let planned = self.plan_remove(product_id).await;
        self.settle(CartOperation::Remove, product_id, &correlation_id, planned).await;
    }

    pub async fn update_product_amount(&self, request: UpdateProductAmount) {
        let _guard = self.mutation.lock().await;
        let correlation_id = Uuid::new_v4().to_string();
        let planned = self.plan_update(request).await;
        self.settle(CartOperation::Update, request.product_id, &correlation_id, planned).await;
    }

    /// Empties the cart. A storage failure is reported as `RemoveFailed`.
    pub async fn clear(&self) {
        let _guard = self.mutation.lock().await;
        let correlation_id = Uuid::new_v4().to_string();
        let correlation_id = correlation_id.as_str();

        match self.commit(Cart::default()).await {
            Ok(()) => info!(
                event_name = "cart.operation.committed",
                operation = CartOperation::Clear.as_str(),
                correlation_id,
                "cart cleared"
            ),
            Err(error) => self.reject(CartOperation::Clear, None, correlation_id, error),
        }
    }

    async fn plan_add(&self, product_id: ProductId) -> Result<Change, CartError> {
        let cart = self.cart().await;

        let Some(existing) = cart.find(product_id).map(|item| item.amount) else {
            let product = self.inventory.get_product(product_id).await?;
            let stock = self.inventory.get_stock(product_id).await?;

            if stock.amount > 0 {
                return Ok(Change::Commit(cart.with_item(CartItem::new(product, 1))));
            }
            if self.settings.policy.notify_unavailable_new_product {
                return Err(CartError::OutOfStock { product_id, requested: 1, available: 0 });
            }
            return Ok(Change::Unchanged { reason: "product has no stock" });
        };

        let stock = self.inventory.get_stock(product_id).await?;
        if stock.amount <= existing {
            return Err(CartError::OutOfStock {
                product_id,
                requested: existing.saturating_add(1),
                available: stock.amount,
            });
        }

        cart.with_amount(product_id, existing + 1)
            .map(Change::Commit)
            .ok_or(CartError::NotInCart(product_id))
    }

    async fn plan_remove(&self, product_id: ProductId) -> Result<Change, CartError> {
        let cart = self.cart().await;

        match cart.find(product_id) {
            Some(item) if item.amount > 0 => {
                cart.without(product_id).map(Change::Commit).ok_or(CartError::NotInCart(product_id))
            }
            _ => Err(CartError::NotInCart(product_id)),
        }
    }

    async fn plan_update(&self, request: UpdateProductAmount) -> Result<Change, CartError> {
        let UpdateProductAmount { product_id, amount } = request;
        let stock = self.inventory.get_stock(product_id).await?;
        let cart = self.cart().await;

        let Some(item) = cart.find(product_id) else {
            return Ok(Change::Unchanged { reason: "product is not in the cart" });
        };
        if item.amount == 0 {
            return Ok(Change::Unchanged { reason: "cart entry has no quantity" });
        }
        if amount > stock.amount {
            return Err(CartError::OutOfStock {
                product_id,
                requested: amount,
                available: stock.amount,
            });
        }
        // Quantity floor: dropping to zero goes through `remove_product`.
        if amount < 1 {
            return Ok(Change::Unchanged { reason: "amount is below the minimum of one" });
        }

        cart.with_amount(product_id, amount)
            .map(Change::Commit)
            .ok_or(CartError::NotInCart(product_id))
    }

    async fn settle(
        &self,
        operation: CartOperation,
        product_id: ProductId,
        correlation_id: &str,
        planned: Result<Change, CartError>,
    ) {
        let result = match planned {
            Ok(Change::Commit(next)) => self.commit(next).await.map(|()| true),
            Ok(Change::Unchanged { reason }) => {
                debug!(
                    event_name = "cart.operation.unchanged",
                    operation = operation.as_str(),
                    correlation_id,
                    product_id = product_id.0,
                    reason,
                    "cart operation left the cart unchanged"
                );
                Ok(false)
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(true) => info!(
                event_name = "cart.operation.committed",
                operation = operation.as_str(),
                correlation_id,
                product_id = product_id.0,
                "cart operation committed"
            ),
            Ok(false) => {}
            Err(error) => self.reject(operation, Some(product_id), correlation_id, error),
        }
    }

    fn reject(
        &self,
        operation: CartOperation,
        product_id: Option<ProductId>,
        correlation_id: &str,
        error: CartError,
    ) {
        warn!(
            event_name = "cart.operation.rejected",
            operation = operation.as_str(),
            correlation_id,
            product_id = product_id.map(|id| id.0),
            error_class = error.class(),
            error = %error,
            "cart operation rejected"
        );
        self.notifications.notify(error.into_notice(operation));
    }

    async fn commit(&self, next: Cart) -> Result<(), CartError> {
        let bytes =
            serde_json::to_vec(&next).map_err(|error| CartError::Serialization(error.to_string()))?;
        self.storage.set(&self.settings.cart_key, &bytes).await?;

        *self.cart.write().await = next.clone();
        // Sending fails only when nobody is subscribed.
        let _ = self.changes.send(next);
        Ok(())
    }
}

fn decode_cart(cart_key: &str, bytes: &[u8]) -> Cart {
    match serde_json::from_slice::<Vec<CartItem>>(bytes) {
        Ok(items) => Cart::new(items),
        Err(error) => {
            warn!(
                event_name = "cart.storage.decode_failed",
                cart_key,
                error = %error,
                "persisted cart could not be parsed; starting with an empty cart"
            );
            Cart::default()
        }
    }
}
