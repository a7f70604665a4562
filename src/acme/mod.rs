//! # Certificate Issuance
//!
//! Obtains certificate material for a domain from an ACME certificate
//! authority, validating control of the domain through DNS-01.

pub mod chain;
pub mod dns01;
pub mod issuer;

use async_trait::async_trait;

use crate::domain::CertificateMaterial;
use crate::errors::Result;

pub use chain::split_chain;
pub use dns01::{challenge_fqdn, CommandDns01Provider, Dns01Provider};
pub use issuer::AcmeIssuer;

/// Issues fresh certificate material for `(domain, email)`.
///
/// Every failure is reported as `CertKeeperError::Issuance` naming the
/// domain. Implementations do not retry.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, domain: &str, email: &str) -> Result<CertificateMaterial>;
}
