//! Per-domain mutual exclusion.
//!
//! One async mutex per domain, created on demand and dropped again once no
//! operation holds or waits on it. Different domains never contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct DomainLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl DomainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `domain`.
    pub async fn acquire(&self, domain: &str) -> DomainGuard {
        let lock = self.locks.entry(domain.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        DomainGuard { domain: domain.to_string(), guard: Some(guard), locks: Arc::clone(&self.locks) }
    }

    /// Number of domains with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one mutating operation on one domain.
#[derive(Debug)]
pub struct DomainGuard {
    domain: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for DomainGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map itself still references the mutex: nobody is waiting.
        self.locks.remove_if(&self.domain, |_, lock| Arc::strong_count(lock) == 1);
    }
}
