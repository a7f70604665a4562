//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` is a fresh SQLite file in its own temporary directory
//! with all migrations applied. The directory is removed on drop.
//!
//! This module is only available in test builds (`#[cfg(test)]`).

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, DbPool};

/// A migrated SQLite database living in a temporary directory.
///
/// Keep this struct alive for the duration of the test.
pub struct TestDatabase {
    pub pool: DbPool,
    _dir: tempfile::TempDir,
}

impl TestDatabase {
    /// Create a new migrated database. `prefix` names the file for debugging.
    pub async fn new(prefix: &str) -> Self {
        let dir = tempfile::tempdir()
            .unwrap_or_else(|e| panic!("Failed to create temp dir for {}: {}", prefix, e));

        let config = DatabaseConfig {
            auto_migrate: true,
            max_connections: 5,
            ..DatabaseConfig::for_path(dir.path().join(format!("{}.db", prefix)))
        };

        let pool = create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test pool for {}: {}", prefix, e));

        Self { pool, _dir: dir }
    }
}
