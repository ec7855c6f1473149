//! Configuration management.

mod settings;

pub use settings::{default_sources, AppConfig, AppSettings, HealthSettings, StorageSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load configuration from file and environment.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// used when present and built-in defaults otherwise. Environment variables
/// such as `QUOTEWATCH__HEALTH__PROBE_TIMEOUT_MS` override both.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("QUOTEWATCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
