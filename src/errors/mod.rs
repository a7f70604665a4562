//! # Error Handling
//!
//! Custom error types for certkeeper, defined with `thiserror`.

pub mod types;

pub use types::{CertKeeperError, Result};

/// Short alias used throughout the crate
pub type Error = CertKeeperError;
