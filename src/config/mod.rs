//! # Configuration Management
//!
//! Layered configuration for certkeeper: built-in defaults, an optional
//! YAML/TOML file, then `CERTKEEPER__SECTION__KEY` environment variables.

pub mod settings;

pub use settings::{
    AcmeConfig, AppConfig, DatabaseConfig, DnsHookConfig, LifecycleConfig, ObservabilityConfig,
    OcspConfig, ServerConfig, LETS_ENCRYPT_STAGING,
};

use crate::errors::Result;
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CERTKEEPER";

/// Load and validate the application configuration.
///
/// A missing file is not an error; unset keys fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;

    tracing::debug!(config_file = ?path, "Configuration loaded");
    Ok(app_config)
}
