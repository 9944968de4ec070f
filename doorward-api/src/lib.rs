//! # Doorward API Server
//!
//! HTTP surface of the access decision engine, consumed by door controllers.
//!
//! ## Endpoints
//!
//! - `POST /verify-access` - Decide on a `{sensorId, key, type}` credential
//! - `POST /clear-access-cache` - Drop cached buckets (`?sensorIds=a,b` or all)
//! - `GET /health` - Liveness and cache size
//!
//! ## Example
//!
//! ```rust,ignore
//! use doorward_api::{ApiConfig, ApiServer};
//!
//! let config = ApiConfig::from_env()?;
//! let server = ApiServer::from_config(config).await?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::future::Future;
use std::sync::Arc;

use axum::{body::Body, extract::DefaultBodyLimit, http::Request, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use doorward_core::constants::MAX_REQUEST_BODY_BYTES;
use doorward_core::error::Result;

/// API server for Doorward.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Builds the store and service from `config`.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        Ok(Self::with_state(AppState::from_config(config).await?))
    }

    /// Creates a server over existing state.
    pub fn with_state(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes and layers configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        });

        create_router(self.state.clone())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
            .layer(TimeoutLayer::new(self.state.config.request_timeout))
            .layer(cors)
            .layer(trace)
    }

    /// Binds the configured address and serves until Ctrl-C or SIGTERM.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.state.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("Doorward API server listening on {}", addr);
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves, then drains background audit work.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        let grace = self.state.config.shutdown_grace;
        info!(in_flight = self.state.service.in_flight(), "Draining audit tasks");
        if !self.state.service.drain(grace).await {
            warn!("Shutdown grace elapsed, pending audit records dropped");
        }
        info!("Doorward API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
