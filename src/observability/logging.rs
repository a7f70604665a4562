//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{CertKeeperError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            CertKeeperError::config_with_source(
                format!("Invalid log level '{}'", config.log_level),
                Box::new(e),
            )
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| CertKeeperError::config(format!("Failed to install logger: {}", e)))
}

/// Create a tracing span for HTTP requests
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for one sweep run
#[macro_export]
macro_rules! sweep_span {
    ($sweep:expr) => {
        tracing::info_span!(
            "lifecycle_sweep",
            sweep = %$sweep,
            run_id = %uuid::Uuid::new_v4()
        )
    };
    ($sweep:expr, $($field:tt)*) => {
        tracing::info_span!(
            "lifecycle_sweep",
            sweep = %$sweep,
            run_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_url = %crate::storage::pool::sanitize_url(&config.database.url),
        acme_directory = %config.acme.directory_url,
        dns_hook_configured = config.acme.dns_hook.is_some(),
        renewal_threshold_days = config.lifecycle.renewal_threshold_days,
        expiration_threshold_days = config.lifecycle.expiration_threshold_days,
        sweep_concurrency = config.lifecycle.sweep_concurrency,
        "certkeeper configuration"
    );
}
