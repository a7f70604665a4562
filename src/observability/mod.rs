//! # Observability Infrastructure
//!
//! Structured logging for certkeeper.

pub mod logging;

pub use logging::{init_logging, log_config_info};
