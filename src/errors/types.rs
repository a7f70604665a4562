//! # Error Types
//!
//! Error taxonomy for the certificate lifecycle manager using `thiserror`.
//! Every variant raised on behalf of a domain carries that domain so callers
//! of a Manager operation (or a sweep report) can tell which record failed.

/// Custom result type for certkeeper operations
pub type Result<T> = std::result::Result<T, CertKeeperError>;

/// Main error type for certkeeper
#[derive(thiserror::Error, Debug)]
pub enum CertKeeperError {
    /// The CA or the DNS-01 challenge rejected an issuance request
    #[error("Issuance failed for '{domain}': {message}")]
    Issuance {
        domain: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A record for the domain already exists
    #[error("Certificate for domain '{domain}' already exists")]
    AlreadyExists { domain: String },

    /// No record exists for the domain
    #[error("Certificate for domain '{domain}' does not exist")]
    NotFound { domain: String },

    /// Store I/O failure
    #[error("Persistence error: {context}")]
    Persistence {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// A stored PEM block is not a well-formed certificate
    #[error("Malformed certificate for '{domain}': {message}")]
    MalformedCertificate { domain: String, message: String },

    /// The client certificate carries no OCSP responder URL
    #[error("Certificate for '{domain}' has no OCSP responder endpoint")]
    NoRevocationEndpoint { domain: String },

    /// Revocation status could not be determined (network or decode failure)
    #[error("Revocation check failed for '{domain}': {message}")]
    RevocationCheck { domain: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CertKeeperError {
    /// Create an issuance error
    pub fn issuance<D: Into<String>, S: Into<String>>(domain: D, message: S) -> Self {
        Self::Issuance { domain: domain.into(), message: message.into(), source: None }
    }

    /// Create an issuance error with source
    pub fn issuance_with_source<D: Into<String>, S: Into<String>>(
        domain: D,
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Issuance { domain: domain.into(), message: message.into(), source: Some(source) }
    }

    /// Create an already-exists error
    pub fn already_exists<D: Into<String>>(domain: D) -> Self {
        Self::AlreadyExists { domain: domain.into() }
    }

    /// Create a not found error
    pub fn not_found<D: Into<String>>(domain: D) -> Self {
        Self::NotFound { domain: domain.into() }
    }

    /// Create a persistence error
    pub fn persistence<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Persistence { source, context: context.into() }
    }

    /// Create a malformed certificate error
    pub fn malformed_certificate<D: Into<String>, S: Into<String>>(domain: D, message: S) -> Self {
        Self::MalformedCertificate { domain: domain.into(), message: message.into() }
    }

    /// Create a missing revocation endpoint error
    pub fn no_revocation_endpoint<D: Into<String>>(domain: D) -> Self {
        Self::NoRevocationEndpoint { domain: domain.into() }
    }

    /// Create a revocation check error
    pub fn revocation_check<D: Into<String>, S: Into<String>>(domain: D, message: S) -> Self {
        Self::RevocationCheck { domain: domain.into(), message: message.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// The domain this error was raised for, if any
    pub fn domain(&self) -> Option<&str> {
        match self {
            CertKeeperError::Issuance { domain, .. }
            | CertKeeperError::AlreadyExists { domain }
            | CertKeeperError::NotFound { domain }
            | CertKeeperError::MalformedCertificate { domain, .. }
            | CertKeeperError::NoRevocationEndpoint { domain }
            | CertKeeperError::RevocationCheck { domain, .. } => Some(domain),
            _ => None,
        }
    }

    /// Add context to an error
    pub(crate) fn add_context(&mut self, context: String) {
        match self {
            CertKeeperError::Io { context: ref mut ctx, .. }
            | CertKeeperError::Persistence { context: ref mut ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            _ => {}
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CertKeeperError::Issuance { .. } => 502,
            CertKeeperError::AlreadyExists { .. } => 409,
            CertKeeperError::NotFound { .. } => 404,
            CertKeeperError::Persistence { .. } => 500,
            CertKeeperError::MalformedCertificate { .. } => 422,
            CertKeeperError::NoRevocationEndpoint { .. } => 422,
            CertKeeperError::RevocationCheck { .. } => 502,
            CertKeeperError::Config { .. } => 500,
            CertKeeperError::Validation { .. } => 400,
            CertKeeperError::Io { .. } => 500,
            CertKeeperError::Internal { .. } => 500,
        }
    }

    /// Whether an external scheduler could reasonably try this again later.
    /// The lifecycle manager itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CertKeeperError::Persistence { .. }
                | CertKeeperError::Io { .. }
                | CertKeeperError::RevocationCheck { .. }
        )
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CertKeeperError::Issuance { .. } => "issuance_error",
            CertKeeperError::AlreadyExists { .. } => "already_exists",
            CertKeeperError::NotFound { .. } => "not_found",
            CertKeeperError::Persistence { .. } => "persistence_error",
            CertKeeperError::MalformedCertificate { .. } => "malformed_certificate",
            CertKeeperError::NoRevocationEndpoint { .. } => "no_revocation_endpoint",
            CertKeeperError::RevocationCheck { .. } => "revocation_check_error",
            CertKeeperError::Config { .. } => "config_error",
            CertKeeperError::Validation { .. } => "validation_error",
            CertKeeperError::Io { .. } => "io_error",
            CertKeeperError::Internal { .. } => "internal_error",
        }
    }
}

impl From<sqlx::Error> for CertKeeperError {
    fn from(error: sqlx::Error) -> Self {
        Self::Persistence { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for CertKeeperError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<config::ConfigError> for CertKeeperError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for CertKeeperError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
