use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};

/// One product held in the cart together with the quantity selected.
///
/// Serialized as a flat record so the persisted form reads as a product with an
/// extra `amount` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub amount: u32,
}

impl CartItem {
    pub fn new(product: Product, amount: u32) -> Self {
        Self { product, amount }
    }

    pub fn id(&self) -> ProductId {
        self.product.id
    }

    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.amount)
    }
}

/// Ordered product selection, unique by product id.
///
/// Every mutation helper returns a new `Cart` and leaves `self` untouched, so a
/// caller can persist the next value before committing it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new(items: Vec<CartItem>) -> Self {
        let mut cart = Self::default();
        for item in items {
            cart = match cart.position(item.id()) {
                Some(_) => cart,
                None => cart.with_item(item),
            };
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.amount)).sum()
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == product_id)
    }

    pub fn find(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == product_id)
    }

    /// Appends `item`, replacing an existing entry for the same product in place.
    pub fn with_item(&self, item: CartItem) -> Self {
        let mut items = self.items.clone();
        match self.position(item.id()) {
            Some(index) => items[index] = item,
            None => items.push(item),
        }
        Self { items }
    }

    pub fn with_amount(&self, product_id: ProductId, amount: u32) -> Option<Self> {
        let index = self.position(product_id)?;
        let mut items = self.items.clone();
        items[index].amount = amount;
        Some(Self { items })
    }

    pub fn without(&self, product_id: ProductId) -> Option<Self> {
        let index = self.position(product_id)?;
        let mut items = self.items.clone();
        items.remove(index);
        Some(Self { items })
    }
}
