//! Shopping-cart state for a storefront.
//!
//! [`store::CartStore`] holds the shopper's selection, persists it through a
//! [`ports::KeyValueStore`] and checks quantities against a
//! [`ports::InventoryClient`]. Failures surface as [`notify::Notice`]s.

pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod ports;
pub mod store;

pub use domain::cart::{Cart, CartItem};
pub use domain::product::{Product, ProductId, StockInfo};
pub use errors::{CartError, CartOperation, InventoryError, StorageError};
pub use notify::{InMemoryNotificationSink, Notice, NotificationSink, TracingNotificationSink};
pub use ports::{InventoryClient, KeyValueStore};
pub use store::{CartStore, CartStoreSettings, UpdateProductAmount};
