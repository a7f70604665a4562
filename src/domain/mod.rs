//! Domain layer
//!
//! Certificate entities shared by the store, the issuance and revocation
//! adapters, and the lifecycle manager. No infrastructure dependencies.

pub mod certificate;

pub use certificate::{
    validate_domain, AgedCertificate, CertificateMaterial, CertificatePair, CertificateRecord,
    PrivateKeyPem, StoredChain,
};
