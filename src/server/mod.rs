//! HTTP surface of the relay.
//!
//! - `POST /upload`  — multipart `file` (PDF) → `{document_text, page_count}`
//! - `POST /analyze` — `{document_text, analysis_type, history?, question?}`
//!   → `{analysis_result}`
//! - `GET /health`   — liveness probe
//!
//! Handlers keep no state between requests. [`AppState`] only carries the
//! read-only config and the generation client, both built at startup.

mod error;
mod handlers;

pub use handlers::{AnalyzeResponse, HealthResponse, UploadResponse};

use crate::config::RelayConfig;
use crate::pipeline::llm::ResilientClient;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    /// `None` when no API key was configured; `/analyze` then answers 503.
    pub client: Option<Arc<ResilientClient>>,
}

impl AppState {
    /// State with a Gemini client, or without one when the key is missing.
    pub fn new(config: RelayConfig) -> Result<Self, crate::RelayError> {
        let client = if config.is_api_configured() {
            Some(Arc::new(ResilientClient::gemini(&config)?))
        } else {
            error!(
                "GEMINI_API_KEY is not set: /analyze is disabled and will answer 503 \
                 until the server is restarted with a key"
            );
            None
        };
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// State with a caller-supplied client (tests, alternative transports).
    pub fn with_client(config: RelayConfig, client: ResilientClient) -> Self {
        Self {
            config: Arc::new(config),
            client: Some(Arc::new(client)),
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/upload", post(handlers::handle_upload))
        .route("/analyze", post(handlers::handle_analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    info!("Upload staging dir: {}", state.config.upload_dir.display());

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
