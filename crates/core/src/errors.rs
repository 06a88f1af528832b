use thiserror::Error;

use crate::domain::product::ProductId;
use crate::notify::Notice;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("product {0} was not found in the inventory service")]
    NotFound(ProductId),
    #[error("inventory request failed: {0}")]
    Network(String),
    #[error("inventory endpoint `{url}` returned status {status}")]
    Status { status: u16, url: String },
    #[error("could not decode inventory response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("storage value for `{key}` is not valid: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure of a single cart operation.
///
/// Never returned from the public `CartStore` operations; it is mapped to a
/// [`Notice`] at the operation boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("requested {requested} of product {product_id}, {available} available")]
    OutOfStock { product_id: ProductId, requested: u32, available: u32 },
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("cart serialization failed: {0}")]
    Serialization(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    Remove,
    Update,
    Clear,
}

impl CartOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Clear => "clear",
        }
    }

    fn failure_notice(self) -> Notice {
        match self {
            Self::Add => Notice::AddFailed,
            Self::Remove | Self::Clear => Notice::RemoveFailed,
            Self::Update => Notice::UpdateFailed,
        }
    }
}

impl CartError {
    pub fn into_notice(self, operation: CartOperation) -> Notice {
        match self {
            Self::OutOfStock { .. } => Notice::OutOfStock,
            Self::NotInCart(_) | Self::Inventory(_) | Self::Storage(_) | Self::Serialization(_) => {
                operation.failure_notice()
            }
        }
    }

    /// Short machine-readable class used in structured logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::OutOfStock { .. } => "out_of_stock",
            Self::NotInCart(_) => "not_in_cart",
            Self::Inventory(_) => "inventory",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::product::ProductId;
    use crate::errors::{CartError, CartOperation, InventoryError, StorageError};
    use crate::notify::Notice;

    #[test]
    fn out_of_stock_keeps_its_notice_for_every_operation() {
        for operation in [CartOperation::Add, CartOperation::Update, CartOperation::Remove] {
            let error =
                CartError::OutOfStock { product_id: ProductId(1), requested: 3, available: 2 };
            assert_eq!(error.into_notice(operation), Notice::OutOfStock);
        }
    }

    #[test]
    fn inventory_failures_map_to_operation_failure_notice() {
        let error = CartError::from(InventoryError::Network("connection refused".to_owned()));
        assert_eq!(error.clone().into_notice(CartOperation::Add), Notice::AddFailed);
        assert_eq!(error.into_notice(CartOperation::Update), Notice::UpdateFailed);
    }

    #[test]
    fn storage_and_missing_entry_map_to_remove_failed() {
        let storage = CartError::from(StorageError::Backend("disk full".to_owned()));
        assert_eq!(storage.into_notice(CartOperation::Remove), Notice::RemoveFailed);
        assert_eq!(
            CartError::NotInCart(ProductId(99)).into_notice(CartOperation::Remove),
            Notice::RemoveFailed
        );
    }

    #[test]
    fn inventory_errors_render_actionable_messages() {
        let error = InventoryError::Status { status: 503, url: "http://inv/stock/1".to_owned() };
        assert_eq!(error.to_string(), "inventory endpoint `http://inv/stock/1` returned status 503");
        assert_eq!(
            InventoryError::NotFound(ProductId(4)).to_string(),
            "product 4 was not found in the inventory service"
        );
    }
}
