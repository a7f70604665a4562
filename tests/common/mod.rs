//! Common test utilities for all integration tests.
//!
//! Provides a temporary SQLite store, fake collaborators for the lifecycle
//! manager and a small PKI for OCSP tests.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

pub mod fakes;
pub mod pki;
pub mod test_db;
