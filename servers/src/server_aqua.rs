//! # AquaStream Telemetry Gateway
//!
//! The production server for the AquaStream project. This binary accepts
//! periodic pH/turbidity readings from remote probes over HTTP, retains a
//! bounded in-memory history, projects the next pH value after every
//! accept, forwards accepted readings to a PostgreSQL collaborator
//! (best-effort, fire-and-forget), and fans each reading out in real time
//! to every dashboard holding a `/ws` subscription.
//!
//! ## Core Responsibilities:
//! - **Ingestion**: `POST /api/readings` with validation before any state
//!   is touched.
//! - **Query surface**: latest / recent / status reads and an
//!   administrative clear.
//! - **Live fan-out**: WebSocket subscribers bootstrap with the latest
//!   reading and then receive every accept in order.
//! - **System Health & Lifecycle**: a `/health` check endpoint and
//!   graceful shutdown on ctrl-c or SIGTERM.
//! - **Configuration**: layered defaults / JSON file / environment / CLI.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use lib_telemetry::TelemetryService;
use lib_telemetry::connections::db_postgres::Database;

mod aqua_logic;
use aqua_logic::{config, logger, routes, state::AppState, ws};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;
    log::info!(
        "AquaStream gateway booting (history capacity {})",
        config.history_capacity()
    );

    // The single coordinating instance owning history and subscriber set.
    let service = Arc::new(TelemetryService::new(config.history_capacity()));

    // The durable store is a best-effort collaborator: when it is absent
    // or unreachable the gateway still runs, it just stops persisting.
    let db = match config.database_url.as_deref() {
        Some(url) => match init_database(url, config.db_max_connections()).await {
            Ok(db) => {
                log::info!("Durable reading store connected");
                Some(Arc::new(db))
            }
            Err(e) => {
                log::error!(
                    "Durable store unavailable: {}. Readings will not be persisted.",
                    e
                );
                None
            }
        },
        None => {
            log::warn!("No database URL configured; readings will not be persisted.");
            None
        }
    };

    let app_state = AppState { service, db };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/readings",
            post(routes::submit_reading)
                .get(routes::recent_readings)
                .delete(routes::clear_readings),
        )
        .route("/api/readings/latest", get(routes::latest_reading))
        .route("/api/readings/status", get(routes::gateway_status))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::warn!("Shutdown signal received. Closing gateway gracefully...");
        let _ = signal_tx.send(());
    });

    if let (Some(cert_path), Some(key_path)) =
        (config.tls_cert_path.clone(), config.tls_key_path.clone())
    {
        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| anyhow::anyhow!("TLS configuration error: {}", e))?;

        log::info!("Gateway listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let mut shutdown_rx = shutdown_tx.subscribe();
        log::info!("Gateway listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx.recv().await.ok();
                log::info!("Gateway shutting down.");
            })
            .await?;
    }

    Ok(())
}

async fn init_database(url: &str, max_connections: u32) -> anyhow::Result<Database> {
    let db = Database::new(url, max_connections).await?;
    db.ping().await?;
    db.ensure_schema().await?;
    Ok(db)
}

/// Listens for ctrl-c (and SIGTERM on UNIX) to initiate a graceful
/// shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
