//! HTTP server implementation for the remote-read endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tokio::signal;
use tower_http::trace::TraceLayer;

use super::config::ServerConfig;
use super::handlers::{AppState, handle_healthy, handle_metrics, handle_read, handle_ready};
use super::metrics::Metrics;
use super::middleware::track_http_metrics;
use crate::fanout::FanOut;
use crate::storage::Queryable;

/// HTTP server answering Prometheus remote-read requests.
pub struct RemoteReadServer {
    queryable: Arc<dyn Queryable>,
    config: ServerConfig,
}

impl RemoteReadServer {
    pub fn new(queryable: Arc<dyn Queryable>, config: ServerConfig) -> Self {
        Self { queryable, config }
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) -> std::io::Result<()> {
        let remote_read = &self.config.remote_read;
        let options = remote_read.fan_out_options();
        tracing::info!(
            "Remote read limits: max_request_size={} max_concurrency={} query_timeout={:?} \
             partial_failure_mode={:?}",
            remote_read.max_request_size,
            options.max_concurrency,
            options.query_timeout,
            options.partial_failure_mode
        );

        let state = AppState {
            fan_out: Arc::new(FanOut::new(self.queryable, options)),
            metrics: Arc::new(Metrics::new()),
            max_request_size: remote_read.max_request_size,
        };
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port()));
        tracing::info!("Starting remote read server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Builds the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/read", post(handle_read))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(DefaultBodyLimit::max(state.max_request_size))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_http_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
