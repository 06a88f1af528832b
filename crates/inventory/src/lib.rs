//! Inventory service adapters for the cart store.
//!
//! [`HttpInventoryClient`] talks to the storefront's REST API
//! (`GET /products/{id}` and `GET /stock/{id}`); [`InMemoryInventory`] serves
//! the same port from process memory for tests and local tooling.

pub mod http;
pub mod memory;

pub use http::HttpInventoryClient;
pub use memory::InMemoryInventory;
