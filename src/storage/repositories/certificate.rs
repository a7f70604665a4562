//! Certificate record repository.
//!
//! Durable keyed storage for certificate material, one row per domain.
//! Owns no policy: the lifecycle manager decides when rows are written.

use crate::domain::{AgedCertificate, CertificateRecord, PrivateKeyPem, StoredChain};
use crate::errors::{CertKeeperError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sqlx::FromRow;
use tracing::instrument;

/// Fixed-width RFC 3339 so that textual order equals chronological order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp; also accepts SQLite `datetime('now')` output.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    Err(CertKeeperError::validation(format!("Invalid timestamp format: {}", s)))
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
struct CertificateRow {
    domain: String,
    private_key: String,
    issuer_cert: String,
    cert: String,
    created_at: String,
    email: String,
}

impl TryFrom<CertificateRow> for CertificateRecord {
    type Error = CertKeeperError;

    fn try_from(row: CertificateRow) -> Result<Self> {
        Ok(CertificateRecord {
            created_at: parse_timestamp(&row.created_at)?,
            domain: row.domain,
            email: row.email,
            client_cert: row.cert,
            issuer_cert: row.issuer_cert,
            private_key: PrivateKeyPem::new(row.private_key),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct AgedRow {
    domain: String,
    email: String,
    created_at: String,
}

impl TryFrom<AgedRow> for AgedCertificate {
    type Error = CertKeeperError;

    fn try_from(row: AgedRow) -> Result<Self> {
        Ok(AgedCertificate {
            created_at: parse_timestamp(&row.created_at)?,
            domain: row.domain,
            email: row.email,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ChainRow {
    domain: String,
    cert: String,
    issuer_cert: String,
}

impl From<ChainRow> for StoredChain {
    fn from(row: ChainRow) -> Self {
        StoredChain { domain: row.domain, client_cert: row.cert, issuer_cert: row.issuer_cert }
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert a new record; `AlreadyExists` if the domain is present.
    async fn insert(&self, record: &CertificateRecord) -> Result<()>;

    /// Insert or replace every field but `domain`.
    async fn upsert(&self, record: &CertificateRecord) -> Result<()>;

    /// Fetch the record for a domain; `NotFound` if absent.
    async fn get(&self, domain: &str) -> Result<CertificateRecord>;

    /// Delete the record for a domain; `NotFound` if absent.
    async fn delete(&self, domain: &str) -> Result<()>;

    /// Delete only if the stored `created_at` still equals `created_at`.
    /// Returns whether a row was removed.
    async fn delete_if_unchanged(&self, domain: &str, created_at: DateTime<Utc>) -> Result<bool>;

    /// Records whose `created_at` is at or before `cutoff`.
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<AgedCertificate>>;

    /// Every stored certificate chain.
    async fn list_all(&self) -> Result<Vec<StoredChain>>;
}

// ============================================================================
// SQLx Implementation
// ============================================================================

#[derive(Debug, Clone)]
pub struct SqlxCertificateRepository {
    pool: DbPool,
}

impl SqlxCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl CertificateRepository for SqlxCertificateRepository {
    #[instrument(skip(self, record), fields(domain = %record.domain), name = "db_insert_certificate")]
    async fn insert(&self, record: &CertificateRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_cert_table (domain, private_key, issuer_cert, cert, created_at, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.domain)
        .bind(record.private_key.expose())
        .bind(&record.issuer_cert)
        .bind(&record.client_cert)
        .bind(format_timestamp(record.created_at))
        .bind(&record.email)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CertKeeperError::already_exists(&record.domain)
            } else {
                CertKeeperError::persistence(
                    e,
                    format!("Failed to insert certificate for domain: {}", record.domain),
                )
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self, record), fields(domain = %record.domain), name = "db_upsert_certificate")]
    async fn upsert(&self, record: &CertificateRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_cert_table (domain, private_key, issuer_cert, cert, created_at, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(domain) DO UPDATE SET
                private_key = excluded.private_key,
                issuer_cert = excluded.issuer_cert,
                cert = excluded.cert,
                created_at = excluded.created_at,
                email = excluded.email
            "#,
        )
        .bind(&record.domain)
        .bind(record.private_key.expose())
        .bind(&record.issuer_cert)
        .bind(&record.client_cert)
        .bind(format_timestamp(record.created_at))
        .bind(&record.email)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            CertKeeperError::persistence(
                e,
                format!("Failed to upsert certificate for domain: {}", record.domain),
            )
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(domain = %domain), name = "db_get_certificate")]
    async fn get(&self, domain: &str) -> Result<CertificateRecord> {
        let row = sqlx::query_as::<_, CertificateRow>(
            r#"
            SELECT domain, private_key, issuer_cert, cert, created_at, email
            FROM domain_cert_table
            WHERE domain = $1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            CertKeeperError::persistence(
                e,
                format!("Failed to fetch certificate for domain: {}", domain),
            )
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(CertKeeperError::not_found(domain)),
        }
    }

    #[instrument(skip(self), fields(domain = %domain), name = "db_delete_certificate")]
    async fn delete(&self, domain: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM domain_cert_table WHERE domain = $1")
            .bind(domain)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                CertKeeperError::persistence(
                    e,
                    format!("Failed to delete certificate for domain: {}", domain),
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(CertKeeperError::not_found(domain));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(domain = %domain), name = "db_delete_certificate_if_unchanged")]
    async fn delete_if_unchanged(&self, domain: &str, created_at: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM domain_cert_table WHERE domain = $1 AND created_at = $2")
                .bind(domain)
                .bind(format_timestamp(created_at))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    CertKeeperError::persistence(
                        e,
                        format!("Failed to delete certificate for domain: {}", domain),
                    )
                })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff), name = "db_list_certificates_older_than")]
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<AgedCertificate>> {
        let rows = sqlx::query_as::<_, AgedRow>(
            r#"
            SELECT domain, email, created_at
            FROM domain_cert_table
            WHERE created_at <= $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(format_timestamp(cutoff))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CertKeeperError::persistence(e, "Failed to list aged certificates"))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    #[instrument(skip(self), name = "db_list_all_certificates")]
    async fn list_all(&self) -> Result<Vec<StoredChain>> {
        let rows = sqlx::query_as::<_, ChainRow>(
            "SELECT domain, cert, issuer_cert FROM domain_cert_table ORDER BY domain",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CertKeeperError::persistence(e, "Failed to list certificates"))?;

        Ok(rows.into_iter().map(StoredChain::from).collect())
    }
}
