use cartstore_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

/// Installs the global subscriber from the configured logging section, falling
/// back to defaults when the configuration does not load. Logs go to stderr so
/// stdout carries only command payloads.
pub fn init_from_env() {
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init(&logging);
}

pub fn init(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
