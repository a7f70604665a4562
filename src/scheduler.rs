//! Timer-driven sweep runner.
//!
//! Spawns one task per sweep. Each task ticks on its own interval, calls
//! the matching [`LifecycleManager`] sweep and logs the outcome. Failed
//! domains are simply picked up again on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::LifecycleConfig;
use crate::errors::Result;
use crate::lifecycle::{LifecycleManager, SweepReport};

/// Which sweep a task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Renew,
    PurgeExpired,
    PurgeRevoked,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Renew => "renew",
            SweepKind::PurgeExpired => "purge_expired",
            SweepKind::PurgeRevoked => "purge_revoked",
        }
    }
}

/// Run one sweep with thresholds taken from `config`.
pub async fn run_sweep(
    manager: &LifecycleManager,
    config: &LifecycleConfig,
    kind: SweepKind,
) -> Result<SweepReport> {
    match kind {
        SweepKind::Renew => manager.renew_near_expiry(config.renewal_threshold()).await,
        SweepKind::PurgeExpired => manager.purge_expired(config.expiration_threshold()).await,
        SweepKind::PurgeRevoked => manager.purge_revoked().await,
    }
}

/// Handle for stopping a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn shutdown(&self) {
        info!("Stopping sweep scheduler");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for every sweep task to exit
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

pub struct SweepScheduler {
    manager: Arc<LifecycleManager>,
    config: LifecycleConfig,
}

impl SweepScheduler {
    pub fn new(manager: Arc<LifecycleManager>, config: LifecycleConfig) -> Self {
        Self { manager, config }
    }

    /// Spawn the renew, purge-expired and purge-revoked tasks.
    ///
    /// Each task's first run happens one full interval after start.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let schedule = [
            (SweepKind::Renew, self.config.renewal_interval()),
            (SweepKind::PurgeExpired, self.config.expiration_interval()),
            (SweepKind::PurgeRevoked, self.config.revocation_interval()),
        ];

        let tasks = schedule
            .into_iter()
            .map(|(kind, every)| {
                let manager = Arc::clone(&self.manager);
                let config = self.config.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(sweep_loop(manager, config, kind, every, shutdown_rx))
            })
            .collect::<Vec<_>>();

        info!(
            renewal_interval_secs = self.config.renewal_interval_seconds,
            expiration_interval_secs = self.config.expiration_interval_seconds,
            revocation_interval_secs = self.config.revocation_interval_seconds,
            "Sweep scheduler started"
        );

        SchedulerHandle { shutdown_tx, tasks }
    }
}

async fn sweep_loop(
    manager: Arc<LifecycleManager>,
    config: LifecycleConfig,
    kind: SweepKind,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_sweep(&manager, &config, kind).await {
                    error!(sweep = kind.as_str(), error = %e, "Sweep could not run");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(sweep = kind.as_str(), "Sweep task stopped");
                    break;
                }
            }
        }
    }
}
