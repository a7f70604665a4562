//! # Certificate Lifecycle
//!
//! Request, read and delete operations plus the three maintenance sweeps
//! (renew near expiry, purge expired, purge revoked). All decisions are
//! driven by issuance age, measured with an injectable [`Clock`].

pub mod clock;
pub mod locks;
pub mod manager;
pub mod report;

pub use clock::{Clock, ManualClock, SystemClock};
pub use locks::{DomainGuard, DomainLocks};
pub use manager::{LifecycleManager, DEFAULT_SWEEP_CONCURRENCY};
pub use report::SweepReport;
