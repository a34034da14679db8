//! Estimate Back binary entrypoint wiring configuration, snapshots and the HTTP server.

use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use estimate_back::{
    config::AppConfig,
    routes, server,
    services::snapshot_supervisor,
    state::{AppState, SharedState},
};

/// Longest time in-flight requests (parked long polls included) may hold up shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("reading configuration")?;
    let listen = config.listen;
    info!(instance = %config.instance_id, "starting instance");

    let app_state = AppState::new(config);

    // A snapshot that exists but cannot be read must not be silently overwritten.
    snapshot_supervisor::restore(&app_state)
        .await
        .context("restoring room snapshot")?;
    let supervisor = snapshot_supervisor::spawn(app_state.clone());

    let app = build_router(app_state.clone());

    info!(addr = %listen, "starting server");
    let listener = TcpListener::bind(listen).await.context("binding server")?;
    server::serve_with_grace(listener, app, shutdown_signal(), SHUTDOWN_GRACE)
        .await
        .context("serving axum")?;

    supervisor.stop().await;
    match snapshot_supervisor::write_snapshot(&app_state).await {
        Ok(true) => info!(rooms = app_state.rooms().len(), "final snapshot written"),
        Ok(false) => {}
        Err(err) => error!(error = %err, "failed to write final snapshot"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
