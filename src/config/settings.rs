//! # Configuration Settings
//!
//! Defines the configuration structure for the certkeeper service.

use crate::errors::{CertKeeperError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP front end configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// ACME issuance configuration
    #[validate(nested)]
    pub acme: AcmeConfig,

    /// OCSP revocation check configuration
    #[validate(nested)]
    pub ocsp: OcspConfig,

    /// Renewal and purge policy
    #[validate(nested)]
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(CertKeeperError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-field checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.lifecycle.expiration_threshold_days <= self.lifecycle.renewal_threshold_days {
            return Err(CertKeeperError::validation_field(
                format!(
                    "Expiration threshold ({} days) must be greater than renewal threshold ({} days)",
                    self.lifecycle.expiration_threshold_days, self.lifecycle.renewal_threshold_days
                ),
                "lifecycle.expiration_threshold_days",
            ));
        }

        if !self.database.is_sqlite() {
            return Err(CertKeeperError::validation_field(
                "Database URL must start with 'sqlite:'",
                "database.url",
            ));
        }

        url::Url::parse(&self.acme.directory_url).map_err(|e| {
            CertKeeperError::validation_field(
                format!("Invalid ACME directory URL: {}", e),
                "acme.directory_url",
            )
        })?;

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Apply pending migrations when the pool is created
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/certkeeper.db".to_string(),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Check if this is a SQLite configuration
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// Configuration for a database file at the given path
    pub fn for_path(path: impl AsRef<std::path::Path>) -> Self {
        Self { url: format!("sqlite://{}", path.as_ref().display()), ..Default::default() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to log output
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { service_name: "certkeeper".to_string(), log_level: "info".to_string(), json_logging: false }
    }
}

/// External command implementing the DNS-01 challenge provider
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct DnsHookConfig {
    /// Program to execute
    #[validate(length(min = 1, message = "DNS hook program cannot be empty"))]
    pub program: String,

    /// Leading arguments passed before the action
    pub args: Vec<String>,
}

/// ACME issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AcmeConfig {
    /// ACME directory of the certificate authority
    #[validate(length(min = 1, message = "ACME directory URL cannot be empty"))]
    pub directory_url: String,

    /// Upper bound on DNS propagation plus order validation
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Propagation timeout must be between 1 and 3600 seconds"
    ))]
    pub propagation_timeout_seconds: u64,

    /// Delay between order status polls
    #[validate(range(
        min = 1,
        max = 60,
        message = "Polling interval must be between 1 and 60 seconds"
    ))]
    pub polling_interval_seconds: u64,

    /// TXT record TTL handed to the DNS hook
    pub dns_ttl_seconds: u32,

    /// DNS-01 provider hook; issuance is unavailable when unset
    #[validate(nested)]
    pub dns_hook: Option<DnsHookConfig>,

    /// Agree to the CA terms of service on account registration
    pub accept_terms_of_service: bool,
}

/// Let's Encrypt staging directory
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            directory_url: LETS_ENCRYPT_STAGING.to_string(),
            propagation_timeout_seconds: 120,
            polling_interval_seconds: 1,
            dns_ttl_seconds: 60,
            dns_hook: None,
            accept_terms_of_service: true,
        }
    }
}

impl AcmeConfig {
    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_secs(self.propagation_timeout_seconds)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }
}

/// OCSP responder client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OcspConfig {
    /// Timeout of one OCSP round trip
    #[validate(range(
        min = 1,
        max = 120,
        message = "OCSP request timeout must be between 1 and 120 seconds"
    ))]
    pub request_timeout_seconds: u64,
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self { request_timeout_seconds: 10 }
    }
}

impl OcspConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Renewal and purge policy, driven by issuance age
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Records at least this old are re-issued
    #[validate(range(
        min = 1,
        max = 36500,
        message = "Renewal threshold must be between 1 and 36500 days"
    ))]
    pub renewal_threshold_days: u32,

    /// Records at least this old are deleted
    #[validate(range(
        min = 1,
        max = 36500,
        message = "Expiration threshold must be between 1 and 36500 days"
    ))]
    pub expiration_threshold_days: u32,

    /// Seconds between renewal sweeps
    #[validate(range(
        min = 1,
        max = 31_536_000,
        message = "Renewal interval must be between 1 second and one year"
    ))]
    pub renewal_interval_seconds: u64,

    /// Seconds between expiration sweeps
    #[validate(range(
        min = 1,
        max = 31_536_000,
        message = "Expiration interval must be between 1 second and one year"
    ))]
    pub expiration_interval_seconds: u64,

    /// Seconds between revocation sweeps
    #[validate(range(
        min = 1,
        max = 31_536_000,
        message = "Revocation interval must be between 1 second and one year"
    ))]
    pub revocation_interval_seconds: u64,

    /// Domains processed in parallel within one sweep
    #[validate(range(
        min = 1,
        max = 64,
        message = "Sweep concurrency must be between 1 and 64"
    ))]
    pub sweep_concurrency: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            renewal_threshold_days: 83,
            expiration_threshold_days: 90,
            renewal_interval_seconds: 86_400,
            expiration_interval_seconds: 86_400,
            revocation_interval_seconds: 86_400,
            sweep_concurrency: 4,
        }
    }
}

fn days(count: u32) -> chrono::Duration {
    chrono::Duration::try_days(i64::from(count)).unwrap_or(chrono::Duration::MAX)
}

impl LifecycleConfig {
    /// Saturates instead of panicking on unvalidated values
    pub fn renewal_threshold(&self) -> chrono::Duration {
        days(self.renewal_threshold_days)
    }

    pub fn expiration_threshold(&self) -> chrono::Duration {
        days(self.expiration_threshold_days)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_seconds)
    }

    pub fn expiration_interval(&self) -> Duration {
        Duration::from_secs(self.expiration_interval_seconds)
    }

    pub fn revocation_interval(&self) -> Duration {
        Duration::from_secs(self.revocation_interval_seconds)
    }
}
