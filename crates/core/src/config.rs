use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CART_KEY: &str = "cart";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub inventory: InventoryConfig,
    pub cart: CartPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub cart_key: String,
}

#[derive(Clone, Debug)]
pub struct InventoryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub api_token: Option<SecretString>,
}

/// Behaviour switches for [`CartStore`](crate::store::CartStore).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CartPolicy {
    /// Emit `OutOfStock` when adding a product that is not in the cart and has no
    /// stock. Off by default: that path has historically been silent.
    pub notify_unavailable_new_product: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub storage_url: Option<String>,
    pub cart_key: Option<String>,
    pub inventory_base_url: Option<String>,
    pub inventory_api_token: Option<String>,
    pub notify_unavailable_new_product: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                url: "sqlite://cartstore.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                cart_key: DEFAULT_CART_KEY.to_string(),
            },
            inventory: InventoryConfig {
                base_url: "http://localhost:3333".to_string(),
                timeout_secs: 10,
                api_token: None,
            },
            cart: CartPolicy::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartstore.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(url) = storage.url {
                self.storage.url = url;
            }
            if let Some(max_connections) = storage.max_connections {
                self.storage.max_connections = max_connections;
            }
            if let Some(timeout_secs) = storage.timeout_secs {
                self.storage.timeout_secs = timeout_secs;
            }
            if let Some(cart_key) = storage.cart_key {
                self.storage.cart_key = cart_key;
            }
        }

        if let Some(inventory) = patch.inventory {
            if let Some(base_url) = inventory.base_url {
                self.inventory.base_url = base_url;
            }
            if let Some(timeout_secs) = inventory.timeout_secs {
                self.inventory.timeout_secs = timeout_secs;
            }
            if let Some(api_token) = inventory.api_token {
                self.inventory.api_token = Some(api_token.into());
            }
        }

        if let Some(cart) = patch.cart {
            if let Some(notify) = cart.notify_unavailable_new_product {
                self.cart.notify_unavailable_new_product = notify;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARTSTORE_STORAGE_URL") {
            self.storage.url = value;
        }
        if let Some(value) = read_env("CARTSTORE_STORAGE_MAX_CONNECTIONS") {
            self.storage.max_connections = parse_u32("CARTSTORE_STORAGE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARTSTORE_STORAGE_TIMEOUT_SECS") {
            self.storage.timeout_secs = parse_u64("CARTSTORE_STORAGE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTSTORE_STORAGE_CART_KEY") {
            self.storage.cart_key = value;
        }

        if let Some(value) = read_env("CARTSTORE_INVENTORY_BASE_URL") {
            self.inventory.base_url = value;
        }
        if let Some(value) = read_env("CARTSTORE_INVENTORY_TIMEOUT_SECS") {
            self.inventory.timeout_secs = parse_u64("CARTSTORE_INVENTORY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTSTORE_INVENTORY_API_TOKEN") {
            self.inventory.api_token = Some(value.into());
        }

        if let Some(value) = read_env("CARTSTORE_CART_NOTIFY_UNAVAILABLE_NEW_PRODUCT") {
            self.cart.notify_unavailable_new_product =
                parse_bool("CARTSTORE_CART_NOTIFY_UNAVAILABLE_NEW_PRODUCT", &value)?;
        }

        let log_level =
            read_env("CARTSTORE_LOGGING_LEVEL").or_else(|| read_env("CARTSTORE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTSTORE_LOGGING_FORMAT").or_else(|| read_env("CARTSTORE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(storage_url) = overrides.storage_url {
            self.storage.url = storage_url;
        }
        if let Some(cart_key) = overrides.cart_key {
            self.storage.cart_key = cart_key;
        }
        if let Some(base_url) = overrides.inventory_base_url {
            self.inventory.base_url = base_url;
        }
        if let Some(api_token) = overrides.inventory_api_token {
            self.inventory.api_token = Some(api_token.into());
        }
        if let Some(notify) = overrides.notify_unavailable_new_product {
            self.cart.notify_unavailable_new_product = notify;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_storage(&self.storage)?;
        validate_inventory(&self.inventory)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartstore.toml"), PathBuf::from("config/cartstore.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    let url = storage.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "storage.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if storage.max_connections == 0 {
        return Err(ConfigError::Validation(
            "storage.max_connections must be greater than zero".to_string(),
        ));
    }

    if storage.timeout_secs == 0 || storage.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "storage.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if storage.cart_key.trim().is_empty() {
        return Err(ConfigError::Validation("storage.cart_key must not be empty".to_string()));
    }

    Ok(())
}

fn validate_inventory(inventory: &InventoryConfig) -> Result<(), ConfigError> {
    let base_url = inventory.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "inventory.base_url must start with http:// or https://".to_string(),
        ));
    }

    if inventory.timeout_secs == 0 || inventory.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "inventory.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let blank_token =
        inventory.api_token.as_ref().is_some_and(|token| token.expose_secret().trim().is_empty());
    if blank_token {
        return Err(ConfigError::Validation(
            "inventory.api_token must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    inventory: Option<InventoryPatch>,
    cart: Option<CartPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    cart_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    api_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CartPatch {
    notify_unavailable_new_product: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
