use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cartstore_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field<'a> {
    key: &'a str,
    env_keys: &'a [&'a str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_token = match &config.inventory.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields = [
        Field {
            key: "storage.url",
            env_keys: &["CARTSTORE_STORAGE_URL"],
            value: config.storage.url.clone(),
        },
        Field {
            key: "storage.max_connections",
            env_keys: &["CARTSTORE_STORAGE_MAX_CONNECTIONS"],
            value: config.storage.max_connections.to_string(),
        },
        Field {
            key: "storage.timeout_secs",
            env_keys: &["CARTSTORE_STORAGE_TIMEOUT_SECS"],
            value: config.storage.timeout_secs.to_string(),
        },
        Field {
            key: "storage.cart_key",
            env_keys: &["CARTSTORE_STORAGE_CART_KEY"],
            value: config.storage.cart_key.clone(),
        },
        Field {
            key: "inventory.base_url",
            env_keys: &["CARTSTORE_INVENTORY_BASE_URL"],
            value: config.inventory.base_url.clone(),
        },
        Field {
            key: "inventory.timeout_secs",
            env_keys: &["CARTSTORE_INVENTORY_TIMEOUT_SECS"],
            value: config.inventory.timeout_secs.to_string(),
        },
        Field {
            key: "inventory.api_token",
            env_keys: &["CARTSTORE_INVENTORY_API_TOKEN"],
            value: api_token,
        },
        Field {
            key: "cart.notify_unavailable_new_product",
            env_keys: &["CARTSTORE_CART_NOTIFY_UNAVAILABLE_NEW_PRODUCT"],
            value: config.cart.notify_unavailable_new_product.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["CARTSTORE_LOGGING_LEVEL", "CARTSTORE_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["CARTSTORE_LOGGING_FORMAT", "CARTSTORE_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("cartstore.toml"), PathBuf::from("config/cartstore.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
