//! Fake issuer and revocation checker.

use async_trait::async_trait;
use certkeeper::acme::CertificateIssuer;
use certkeeper::domain::{CertificateMaterial, PrivateKeyPem};
use certkeeper::errors::{CertKeeperError, Result};
use certkeeper::revocation::RevocationChecker;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Issues deterministic material numbered by call order.
#[derive(Default)]
pub struct FakeIssuer {
    calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    issued: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Make issuance for `domain` fail from now on.
    pub fn fail_for(&self, domain: &str) {
        self.failing.lock().unwrap().insert(domain.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Domains passed to `issue`, in call order
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

/// Leaf PEM produced by the `n`th call (1-based) for `domain`
pub fn fake_leaf(domain: &str, n: usize) -> String {
    format!("-----BEGIN CERTIFICATE-----\nleaf-{}-{}\n-----END CERTIFICATE-----\n", domain, n)
}

pub const FAKE_ISSUER_CHAIN: &str =
    "-----BEGIN CERTIFICATE-----\nfake-intermediate\n-----END CERTIFICATE-----\n";

#[async_trait]
impl CertificateIssuer for FakeIssuer {
    async fn issue(&self, domain: &str, _email: &str) -> Result<CertificateMaterial> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.issued.lock().unwrap().push(domain.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(domain) {
            return Err(CertKeeperError::issuance(domain, "CA rejected the order"));
        }

        Ok(CertificateMaterial {
            private_key: PrivateKeyPem::new(format!("key-{}-{}", domain, n)),
            client_cert: fake_leaf(domain, n),
            issuer_cert: FAKE_ISSUER_CHAIN.to_string(),
        })
    }
}

/// Scripted answer for one domain
#[derive(Debug, Clone, Copy)]
pub enum Verdict {
    Revoked,
    Good,
    Error,
}

/// Answers from a per-domain script; unscripted domains are good.
#[derive(Default)]
pub struct FakeRevocationChecker {
    verdicts: Mutex<HashMap<String, Verdict>>,
    checked: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeRevocationChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn set(&self, domain: &str, verdict: Verdict) {
        self.verdicts.lock().unwrap().insert(domain.to_string(), verdict);
    }

    pub fn checked(&self) -> Vec<String> {
        let mut checked = self.checked.lock().unwrap().clone();
        checked.sort();
        checked
    }
}

#[async_trait]
impl RevocationChecker for FakeRevocationChecker {
    async fn check_revoked(&self, domain: &str, _client: &str, _issuer: &str) -> Result<bool> {
        self.checked.lock().unwrap().push(domain.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let verdict = self.verdicts.lock().unwrap().get(domain).copied().unwrap_or(Verdict::Good);
        match verdict {
            Verdict::Revoked => Ok(true),
            Verdict::Good => Ok(false),
            Verdict::Error => {
                Err(CertKeeperError::revocation_check(domain, "OCSP responder unreachable"))
            }
        }
    }
}
