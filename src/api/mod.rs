//! Ad-hoc HTTP trigger.
//!
//! Raw text in, raw text out:
//! - `POST /notify`: speak the request body on every targeted speaker
//! - `GET /quiet`: suppress notifications for the configured quiet period

mod handlers;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{DeviceTarget, ServerConfig};
use crate::locale::Locale;
use crate::notify::Notifier;
use crate::quiet::QuietWindow;

/// Shared handler state. `quiet` is the same window the notifier consults.
#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<Notifier>,
    pub quiet: QuietWindow,
    pub target: DeviceTarget,
    pub locale: Locale,
    pub quiet_for: Duration,
}

impl AppState {
    pub fn new(notifier: Arc<Notifier>, config: &ServerConfig) -> Self {
        Self {
            quiet: notifier.quiet().clone(),
            notifier,
            target: config.target.clone(),
            locale: config.locale,
            quiet_for: config.quiet_for,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/notify", any(handlers::notify))
        .route("/quiet", any(handlers::quiet))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` fires.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    grace: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    serve_on(listener, state, grace, shutdown).await
}

/// Serve on an already bound listener.
///
/// After `shutdown` fires, in-flight requests get `grace` to finish before
/// the listener is dropped.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    grace: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Server start on {}", listener.local_addr()?);

    let stop = shutdown.clone();
    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async {
        shutdown.cancelled().await;
        info!("HTTP listener will stop...");
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = &mut server => result.context("http server")?,
        _ = drain_deadline => {
            warn!("Requests still in flight after {:?}, abandoning them", grace);
        }
    }
    info!("HTTP listener stopped");
    Ok(())
}
