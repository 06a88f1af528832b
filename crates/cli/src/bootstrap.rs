use std::sync::Arc;

use cartstore_core::config::{AppConfig, ConfigError, LoadOptions};
use cartstore_core::errors::{InventoryError, StorageError};
use cartstore_core::{
    CartStore, CartStoreSettings, InMemoryNotificationSink, Notice, NotificationSink,
    TracingNotificationSink,
};
use cartstore_db::{connect_with_config, migrations, DbPool, SqlKeyValueStore};
use cartstore_inventory::HttpInventoryClient;
use thiserror::Error;
use tracing::info;

/// Notices raised while a command runs: logged, and kept for the command payload.
#[derive(Clone, Default)]
pub struct CommandNotifications {
    recorded: InMemoryNotificationSink,
}

impl CommandNotifications {
    pub fn drain(&self) -> Vec<Notice> {
        self.recorded.drain()
    }
}

impl NotificationSink for CommandNotifications {
    fn notify(&self, notice: Notice) {
        TracingNotificationSink.notify(notice);
        self.recorded.notify(notice);
    }
}

pub struct CartSession {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<CartStore>,
    pub notifications: Arc<CommandNotifications>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage connection failed: {0}")]
    StorageConnect(#[source] sqlx::Error),
    #[error("storage migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("inventory client could not be built: {0}")]
    Inventory(#[source] InventoryError),
    #[error("persisted cart could not be read: {0}")]
    CartLoad(#[source] StorageError),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::StorageConnect(_) => "storage_connectivity",
            Self::Migration(_) => "migration",
            Self::Inventory(_) => "inventory_client",
            Self::CartLoad(_) => "storage_read",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Inventory(_) => 2,
            Self::StorageConnect(_) | Self::CartLoad(_) => 4,
            Self::Migration(_) => 5,
        }
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<CartSession, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<CartSession, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting cart session bootstrap"
    );

    let db_pool =
        connect_with_config(&config.storage).await.map_err(BootstrapError::StorageConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.storage_ready",
        correlation_id = "bootstrap",
        "storage connected and migrated"
    );

    let inventory =
        HttpInventoryClient::new(&config.inventory).map_err(BootstrapError::Inventory)?;
    let notifications = Arc::new(CommandNotifications::default());
    let settings =
        CartStoreSettings { cart_key: config.storage.cart_key.clone(), policy: config.cart };

    let store = CartStore::load(
        Arc::new(inventory),
        Arc::new(SqlKeyValueStore::new(db_pool.clone())),
        notifications.clone(),
        settings,
    )
    .await
    .map_err(BootstrapError::CartLoad)?;

    Ok(CartSession { config, db_pool, store: Arc::new(store), notifications })
}
