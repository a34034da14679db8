//! HTTP server lifecycle: serve until a shutdown signal, then drain for a bounded time.

use std::{future::IntoFuture, io, time::Duration};

use axum::Router;
use tokio::{net::TcpListener, sync::watch, time::sleep};
use tracing::warn;

/// Serve `app` until `shutdown` resolves, then wait at most `grace` for in-flight requests.
///
/// Parked long polls would otherwise hold the drain open for a whole poll timeout. Returns
/// `true` when every connection closed within the grace period, `false` when the remaining
/// ones were dropped.
pub async fn serve_with_grace<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> io::Result<bool>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = stopping_tx.send(true);
        })
        .into_future();
    let drain_deadline = async move {
        if stopping_rx.changed().await.is_ok() {
            sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result.map(|()| true),
        _ = drain_deadline => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "in-flight requests still open after the shutdown grace period; dropping them"
            );
            Ok(false)
        }
    }
}
