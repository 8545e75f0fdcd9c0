use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statusboard_api::config::AppConfig;
use statusboard_api::registry::build_registry;
use statusboard_api::router::build_app_router;
use statusboard_api::sse;
use statusboard_api::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statusboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration ---
    let config = AppConfig::from_env()?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        interval_secs = config.scheduler.interval.as_secs(),
        idle_timeout_secs = config.scheduler.idle_timeout.as_secs(),
        "Loaded configuration"
    );

    // --- Components ---
    let registry = build_registry(&config.monitors)?;
    let state = AppState::new(&config, registry);

    state.scheduler.start().await;
    let heartbeat_handle = sse::start_heartbeat(
        Arc::clone(&state.broadcaster),
        config.sse.heartbeat_interval,
    );

    // Initial pass fills the cache without publishing.
    let orchestrator = Arc::clone(&state.orchestrator);
    let initial_handle = tokio::spawn(async move {
        tracing::info!("Running initial checks");
        let count = orchestrator.warm_cache().await;
        tracing::info!(count, "Initial checks completed");
    });

    // --- Router ---
    let app = build_app_router(state.clone(), &config.server)?;

    // --- Start server ---
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let broadcaster = Arc::clone(&state.broadcaster);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open event streams only end once their subscriber is dropped.
            broadcaster.shutdown_all().await;
        })
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    if tokio::time::timeout(shutdown_timeout, state.scheduler.stop())
        .await
        .is_err()
    {
        tracing::warn!("Scheduler did not stop within the shutdown timeout");
    }

    initial_handle.abort();
    heartbeat_handle.abort();

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
