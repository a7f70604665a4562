//! Repository modules for data access

pub mod certificate;

pub use certificate::{CertificateRepository, SqlxCertificateRepository};
