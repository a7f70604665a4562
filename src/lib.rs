//! # certkeeper
//!
//! Lifecycle manager for domain TLS certificates issued through ACME:
//! requesting, storing, renewing before expiry, purging after expiry and
//! purging certificates their issuer has revoked.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API / CLI / SweepScheduler
//!              ↓
//!      LifecycleManager ──→ CertificateIssuer (ACME, DNS-01)
//!              ↓        └─→ RevocationChecker (OCSP)
//!   CertificateRepository (SQLite)
//! ```
//!
//! The lifecycle manager is the only writer of certificate records. Renewal
//! and purge decisions are driven by issuance age, not by the certificate's
//! own validity period.

pub mod acme;
pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod observability;
pub mod revocation;
pub mod scheduler;
pub mod startup;
pub mod storage;

pub use config::AppConfig;
pub use errors::{CertKeeperError, Error, Result};
pub use lifecycle::{LifecycleManager, SweepReport};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
