use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use super::routes::build_router;
use crate::config::ServerConfig;
use crate::errors::{CertKeeperError, Result};
use crate::lifecycle::LifecycleManager;

/// Serve the HTTP front end until `shutdown` resolves.
pub async fn start_api_server<F>(
    config: &ServerConfig,
    manager: Arc<LifecycleManager>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| CertKeeperError::config(format!("Invalid API address: {}", e)))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| CertKeeperError::Io {
        source: e,
        context: format!("Failed to bind API server to {}", addr),
    })?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, build_router(manager))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CertKeeperError::Io { source: e, context: "API server error".to_string() })?;

    info!("API server shutdown completed");
    Ok(())
}
