//! Lifecycle manager: the only writer of certificate records.
//!
//! Foreground operations and scheduled sweeps share the same per-domain
//! locks, so a sweep and a concurrent delete of the same domain are
//! serialized while different domains proceed in parallel. Issuance and
//! revocation calls can take minutes; no lock is held across more than one
//! domain.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use validator::ValidateEmail;

use super::clock::{Clock, SystemClock};
use super::locks::DomainLocks;
use super::report::{Outcome, SweepReport};
use crate::acme::CertificateIssuer;
use crate::domain::{validate_domain, AgedCertificate, CertificatePair, CertificateRecord, StoredChain};
use crate::errors::{CertKeeperError, Result};
use crate::revocation::RevocationChecker;
use crate::storage::CertificateRepository;

/// Default number of domains processed at once by a sweep
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

pub struct LifecycleManager {
    store: Arc<dyn CertificateRepository>,
    issuer: Arc<dyn CertificateIssuer>,
    checker: Arc<dyn RevocationChecker>,
    clock: Arc<dyn Clock>,
    locks: DomainLocks,
    sweep_concurrency: usize,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("sweep_concurrency", &self.sweep_concurrency)
            .field("locked_domains", &self.locks.len())
            .finish()
    }
}

/// Attach the domain to errors that do not already name one.
fn annotate(mut err: CertKeeperError, domain: &str) -> CertKeeperError {
    if err.domain().is_none() {
        err.add_context(format!("domain {}", domain));
    }
    err
}

/// Oldest `created_at` a sweep with this threshold leaves alone.
fn sweep_cutoff(now: DateTime<Utc>, threshold: Duration, name: &str) -> Result<DateTime<Utc>> {
    if threshold < Duration::zero() {
        return Err(CertKeeperError::validation_field(
            format!("{} must not be negative", name),
            name,
        ));
    }
    now.checked_sub_signed(threshold).ok_or_else(|| {
        CertKeeperError::validation_field(format!("{} is out of range", name), name)
    })
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn CertificateRepository>,
        issuer: Arc<dyn CertificateIssuer>,
        checker: Arc<dyn RevocationChecker>,
    ) -> Self {
        Self {
            store,
            issuer,
            checker,
            clock: Arc::new(SystemClock),
            locks: DomainLocks::new(),
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    /// Issue and store a certificate for a domain that has none yet.
    pub async fn request_certificate(&self, domain: &str, email: &str) -> Result<()> {
        validate_domain(domain)?;
        if !email.validate_email() {
            return Err(CertKeeperError::validation_field(
                format!("Invalid email address: {}", email),
                "email",
            ));
        }

        let _guard = self.locks.acquire(domain).await;

        match self.store.get(domain).await {
            Ok(_) => return Err(CertKeeperError::already_exists(domain)),
            Err(CertKeeperError::NotFound { .. }) => {}
            Err(e) => return Err(annotate(e, domain)),
        }

        let material = self.issuer.issue(domain, email).await?;
        let record = CertificateRecord::from_material(domain, email, material, self.clock.now());

        // The freshly issued material is dropped (and its key zeroed) on failure.
        self.store.insert(&record).await.map_err(|e| annotate(e, domain))?;

        info!(domain = %domain, email = %email, "Certificate requested and stored");
        Ok(())
    }

    pub async fn get_certificate(&self, domain: &str) -> Result<CertificatePair> {
        let record = self.store.get(domain).await.map_err(|e| annotate(e, domain))?;
        Ok(record.pair())
    }

    /// Remove local custody of a certificate. The CA is not asked to revoke it.
    pub async fn delete_certificate(&self, domain: &str) -> Result<()> {
        let _guard = self.locks.acquire(domain).await;
        self.store.delete(domain).await.map_err(|e| annotate(e, domain))?;
        info!(domain = %domain, "Certificate deleted");
        Ok(())
    }

    /// Re-issue every certificate whose issuance age has reached `threshold`.
    pub async fn renew_near_expiry(&self, threshold: Duration) -> Result<SweepReport> {
        let cutoff = sweep_cutoff(self.clock.now(), threshold, "renewal_threshold")?;
        let span = crate::sweep_span!("renew", threshold_days = threshold.num_days());

        async {
            let candidates = self.store.list_older_than(cutoff).await?;
            debug!(candidates = candidates.len(), cutoff = %cutoff, "Renewal candidates listed");

            let report = self
                .run_sweep(candidates, |candidate| self.renew_one(candidate, cutoff))
                .await;
            log_report("renew", &report);
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Delete every certificate whose issuance age has reached `threshold`.
    pub async fn purge_expired(&self, threshold: Duration) -> Result<SweepReport> {
        let cutoff = sweep_cutoff(self.clock.now(), threshold, "expiration_threshold")?;
        let span = crate::sweep_span!("purge_expired", threshold_days = threshold.num_days());

        async {
            let candidates = self.store.list_older_than(cutoff).await?;
            debug!(candidates = candidates.len(), cutoff = %cutoff, "Expiration candidates listed");

            let report = self
                .run_sweep(candidates, |candidate| self.purge_one(candidate, cutoff))
                .await;
            log_report("purge_expired", &report);
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Delete every certificate its issuer reports as revoked.
    ///
    /// Domains whose check fails are reported and left in place.
    pub async fn purge_revoked(&self) -> Result<SweepReport> {
        let span = crate::sweep_span!("purge_revoked");

        async {
            let chains = self.store.list_all().await?;
            debug!(candidates = chains.len(), "Revocation candidates listed");

            let report = self.run_sweep(chains, |chain| self.purge_if_revoked(chain)).await;
            log_report("purge_revoked", &report);
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_sweep<T, F, Fut>(&self, candidates: Vec<T>, process: F) -> SweepReport
    where
        F: Fn(T) -> Fut,
        Fut: std::future::Future<Output = (String, Outcome)>,
    {
        let outcomes: Vec<(String, Outcome)> = stream::iter(candidates)
            .map(process)
            .buffer_unordered(self.sweep_concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (domain, outcome) in outcomes {
            report.record(domain, outcome);
        }
        report.sorted()
    }

    async fn renew_one(&self, candidate: AgedCertificate, cutoff: DateTime<Utc>) -> (String, Outcome) {
        let outcome = self.renew_locked(&candidate.domain, cutoff).await;
        (candidate.domain, outcome)
    }

    async fn renew_locked(&self, domain: &str, cutoff: DateTime<Utc>) -> Outcome {
        let _guard = self.locks.acquire(domain).await;

        let current = match self.store.get(domain).await {
            Ok(record) => record,
            Err(CertKeeperError::NotFound { .. }) => return Outcome::Skipped,
            Err(e) => return Outcome::Failed(annotate(e, domain)),
        };
        if current.created_at > cutoff {
            return Outcome::Skipped;
        }

        let material = match self.issuer.issue(domain, &current.email).await {
            Ok(material) => material,
            Err(e) => return Outcome::Failed(e),
        };

        let now = self.clock.now();
        let created_at = now.max(current.created_at);
        let renewed = CertificateRecord::from_material(domain, &current.email, material, created_at);
        match self.store.upsert(&renewed).await {
            Ok(()) => {
                info!(
                    domain = %domain,
                    previous = %current.created_at,
                    age_days = current.issuance_age(now).num_days(),
                    "Certificate renewed"
                );
                Outcome::Succeeded
            }
            Err(e) => Outcome::Failed(annotate(e, domain)),
        }
    }

    async fn purge_one(&self, candidate: AgedCertificate, cutoff: DateTime<Utc>) -> (String, Outcome) {
        let outcome = self.purge_locked(&candidate.domain, cutoff).await;
        (candidate.domain, outcome)
    }

    async fn purge_locked(&self, domain: &str, cutoff: DateTime<Utc>) -> Outcome {
        let _guard = self.locks.acquire(domain).await;

        let current = match self.store.get(domain).await {
            Ok(record) => record,
            Err(CertKeeperError::NotFound { .. }) => return Outcome::Skipped,
            Err(e) => return Outcome::Failed(annotate(e, domain)),
        };
        if current.created_at > cutoff {
            return Outcome::Skipped;
        }

        self.delete_unchanged(&current, "Expired certificate purged").await
    }

    async fn purge_if_revoked(&self, chain: StoredChain) -> (String, Outcome) {
        let revoked =
            self.checker.check_revoked(&chain.domain, &chain.client_cert, &chain.issuer_cert).await;

        let outcome = match revoked {
            Ok(false) => Outcome::Skipped,
            Ok(true) => self.purge_revoked_locked(&chain).await,
            Err(e) => Outcome::Failed(annotate(e, &chain.domain)),
        };
        (chain.domain, outcome)
    }

    async fn purge_revoked_locked(&self, chain: &StoredChain) -> Outcome {
        let _guard = self.locks.acquire(&chain.domain).await;

        let current = match self.store.get(&chain.domain).await {
            Ok(record) => record,
            Err(CertKeeperError::NotFound { .. }) => return Outcome::Skipped,
            Err(e) => return Outcome::Failed(annotate(e, &chain.domain)),
        };
        // Renewed while the check ran: the new certificate was not checked.
        if current.client_cert != chain.client_cert {
            return Outcome::Skipped;
        }

        self.delete_unchanged(&current, "Revoked certificate purged").await
    }

    async fn delete_unchanged(&self, current: &CertificateRecord, message: &str) -> Outcome {
        match self.store.delete_if_unchanged(&current.domain, current.created_at).await {
            Ok(true) => {
                info!(domain = %current.domain, created_at = %current.created_at, "{}", message);
                Outcome::Succeeded
            }
            Ok(false) => Outcome::Skipped,
            Err(e) => Outcome::Failed(annotate(e, &current.domain)),
        }
    }
}

fn log_report(sweep: &str, report: &SweepReport) {
    for (domain, error) in &report.failed {
        warn!(
            sweep = %sweep,
            domain = %domain,
            error = %error,
            kind = error.kind(),
            retryable = error.is_retryable(),
            "Sweep failed for domain"
        );
    }
    info!(
        sweep = %sweep,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Sweep finished"
    );
}
