use rust_decimal::Decimal;
use serde::Serialize;

use cartstore_core::config::LoadOptions;
use cartstore_core::{Cart, CartItem, CartStore, Notice, ProductId, UpdateProductAmount};

use crate::bootstrap::{bootstrap, CommandNotifications};
use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartAction {
    Show,
    Add(ProductId),
    Remove(ProductId),
    Update(UpdateProductAmount),
    Clear,
}

impl CartAction {
    pub fn command(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Update(_) => "update",
            Self::Clear => "clear",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub distinct_products: usize,
    pub total_units: u64,
    pub total: Decimal,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            distinct_products: cart.len(),
            total_units: cart.total_units(),
            total: cart.total(),
        }
    }
}

/// Payload printed by the cart commands. `status` is `notice` when the
/// operation reported anything to the shopper.
#[derive(Debug, Serialize)]
pub struct CartReport {
    pub command: &'static str,
    pub status: &'static str,
    pub message: String,
    pub notices: Vec<Notice>,
    pub cart: CartView,
}

pub fn run(action: CartAction) -> CommandResult {
    let command = action.command();
    let runtime = match current_thread_runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let session = match bootstrap(LoadOptions::default()).await {
            Ok(session) => session,
            Err(error) => return CommandResult::bootstrap_failure(command, &error),
        };

        let report = execute(&session.store, &session.notifications, action).await;
        session.db_pool.close().await;
        CommandResult::report(&report)
    })
}

pub async fn execute(
    store: &CartStore,
    notifications: &CommandNotifications,
    action: CartAction,
) -> CartReport {
    let before = store.cart().await;

    match action {
        CartAction::Show => {}
        CartAction::Add(product_id) => store.add_product(product_id).await,
        CartAction::Remove(product_id) => store.remove_product(product_id).await,
        CartAction::Update(request) => store.update_product_amount(request).await,
        CartAction::Clear => store.clear().await,
    }

    let after = store.cart().await;
    let notices = notifications.drain();
    let (status, message) = if !notices.is_empty() {
        let messages: Vec<&str> = notices.iter().map(|notice| notice.message()).collect();
        ("notice", messages.join("; "))
    } else if matches!(action, CartAction::Show) {
        ("ok", format!("{} product(s) in cart", after.len()))
    } else if after != before {
        ("ok", "cart updated".to_string())
    } else {
        ("ok", "cart unchanged".to_string())
    };

    CartReport {
        command: action.command(),
        status,
        message,
        notices,
        cart: CartView::from(&after),
    }
}
