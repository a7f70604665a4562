//! Wiring of the store, issuer and revocation checker into a lifecycle
//! manager, and the long-running `serve` mode.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::acme::AcmeIssuer;
use crate::api::start_api_server;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::lifecycle::LifecycleManager;
use crate::revocation::OcspRevocationChecker;
use crate::scheduler::SweepScheduler;
use crate::storage::{create_pool, DbPool, SqlxCertificateRepository};

/// A manager and the pool it writes through
pub struct Runtime {
    pub pool: DbPool,
    pub manager: Arc<LifecycleManager>,
}

/// Connect to the store and assemble the production collaborators.
pub async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let pool = create_pool(&config.database).await?;

    let store = Arc::new(SqlxCertificateRepository::new(pool.clone()));
    let issuer = Arc::new(AcmeIssuer::from_config(&config.acme));
    let checker = Arc::new(OcspRevocationChecker::new(&config.ocsp)?);

    let manager = LifecycleManager::new(store, issuer, checker)
        .with_sweep_concurrency(config.lifecycle.sweep_concurrency);

    Ok(Runtime { pool, manager: Arc::new(manager) })
}

/// Run the HTTP front end and the sweep scheduler until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<()> {
    let runtime = build_runtime(&config).await?;

    let scheduler =
        SweepScheduler::new(Arc::clone(&runtime.manager), config.lifecycle.clone()).spawn();

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Shutdown signal listener failed");
        }
        let _ = stop_tx.send(true);
    });

    let shutdown = async move {
        let _ = stop_rx.wait_for(|stopped| *stopped).await;
    };

    let served = start_api_server(&config.server, Arc::clone(&runtime.manager), shutdown).await;

    scheduler.shutdown();
    scheduler.join().await;
    runtime.pool.close().await;
    info!("certkeeper stopped");

    served
}
