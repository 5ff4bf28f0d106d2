use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobhub_api::app::build_app;
use jobhub_api::background;
use jobhub_api::config::ServerConfig;
use jobhub_api::state::AppState;
use jobhub_db::{DbPool, JobRepo, JobStore, MemoryJobStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobhub_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Store ---
    let (store, pool) = open_store(&config).await;

    // --- Event bus ---
    let event_bus = Arc::new(jobhub_events::EventBus::default());
    let audit_handle = tokio::spawn(jobhub_events::EventAuditLog::run(event_bus.subscribe()));
    tracing::info!("Event bus created");

    // --- App state ---
    let state = AppState::new(store, pool, config.clone(), Arc::clone(&event_bus));

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(background::retention::run(
        state.retention.clone(),
        config.retention_days,
        Duration::from_secs(config.retention_interval_secs),
        cancel.clone(),
    ));
    let watchdog_handle = tokio::spawn(background::watchdog::run(
        state.controller.clone(),
        Duration::from_secs(config.job_timeout_secs),
        Duration::from_secs(config.watchdog_interval_secs),
        cancel.clone(),
    ));

    // --- Router ---
    let app = build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    let _ = tokio::time::timeout(grace, retention_handle).await;
    let _ = tokio::time::timeout(grace, watchdog_handle).await;
    tracing::info!("Background tasks stopped");

    // Dropping the last sender closes the channel and ends the audit log.
    // The router and its state were consumed by `axum::serve`.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, audit_handle).await;
    tracing::info!("Event services shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Connect to PostgreSQL when `DATABASE_URL` is set, otherwise fall back to
/// the in-memory store.
async fn open_store(config: &ServerConfig) -> (Arc<dyn JobStore>, Option<DbPool>) {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory job store (data is not persisted)");
        return (Arc::new(MemoryJobStore::new()), None);
    };

    let pool = jobhub_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    jobhub_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    jobhub_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    (Arc::new(JobRepo::new(pool.clone())), Some(pool))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
