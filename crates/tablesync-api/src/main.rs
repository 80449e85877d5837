//! tablesync API server entry point.

use std::sync::{Arc, Mutex};

use tablesync_api::config::ServerConfig;
use tablesync_api::error::AppError;
use tablesync_api::state::AppState;
use tablesync_api::store::{MemorySessionStore, UnavailableNarrator};
use tablesync_core::clock::{Clock, SystemClock};
use tablesync_core::rng::{DeterministicRng, SystemRng};
use tablesync_session::Orchestrator;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting tablesync session orchestrator");

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(SystemRng::new()));
    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&clock),
        rng,
        Arc::new(MemorySessionStore::new(clock)),
        Arc::new(UnavailableNarrator),
    ));
    let sweeper = orchestrator.spawn_sweeper();

    let app = tablesync_api::app(AppState::new(orchestrator));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
