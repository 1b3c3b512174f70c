//! API server: HTTP routes plus the background training that makes them
//! ready.

use crate::context::{ContextHandle, ServingContext};
use crate::rest::{self, AppState};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use streamline_core::config::AppConfig;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct ApiServer {
    config: AppConfig,
    context: ContextHandle,
}

impl ApiServer {
    pub fn new(config: AppConfig, context: ContextHandle) -> Self {
        Self { config, context }
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    /// All routes over `state`.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/recommend/:user_id", get(rest::recommend))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Load data and train on the blocking pool, then install the result.
    /// Requests get `503` until this finishes.
    pub fn spawn_training(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let handle = self.context.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || ServingContext::load(&config)).await {
                Ok(Ok(context)) => {
                    handle.install(context);
                }
                Ok(Err(e)) => error!(error = %e, "Training failed, model stays unavailable"),
                Err(e) => error!(error = %e, "Training task aborted"),
            }
        })
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = Self::router(AppState::new(self.context.clone()));

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
