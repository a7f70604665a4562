//! Test database utilities for integration tests.

#![allow(clippy::duplicate_mod)]

use certkeeper::config::DatabaseConfig;
use certkeeper::storage::{create_pool, DbPool, SqlxCertificateRepository};
use tempfile::TempDir;

/// A migrated SQLite database living in its own temporary directory.
pub struct TestDatabase {
    pub pool: DbPool,
    _dir: TempDir,
}

impl TestDatabase {
    pub async fn new(prefix: &str) -> Self {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir().expect("create temp dir");
        let config = DatabaseConfig::for_path(dir.path().join("certkeeper.db"));
        let pool = create_pool(&config).await.expect("create test database pool");
        Self { pool, _dir: dir }
    }

    pub fn repository(&self) -> SqlxCertificateRepository {
        SqlxCertificateRepository::new(self.pool.clone())
    }
}
