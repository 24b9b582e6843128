//! HTTP surface for contract review.
//!
//! A small JSON/multipart API over one shared [`AnalysisPipeline`]. Every
//! request owns its document and results; the only shared state is
//! immutable.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::access::AccessGate;
use crate::analyze::AnalysisPipeline;
use crate::error::CounselError;

pub mod api;
pub mod error;
#[cfg(test)]
mod tests;

pub use error::ServerError;

/// Room for multipart boundaries and the small text fields on top of the
/// document itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 16 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub gate: AccessGate,
    /// Accept `?test_mode=true` requests that name a local file.
    pub allow_test_mode: bool,
    pub max_document_bytes: u64,
}

impl AppState {
    /// # Errors
    /// [`CounselError::InvalidConfig`] for an empty passphrase.
    pub fn new(
        pipeline: AnalysisPipeline,
        passphrase: &str,
        allow_test_mode: bool,
    ) -> Result<Self, CounselError> {
        let gate = AccessGate::new(passphrase)?;
        let max_document_bytes = pipeline.config().max_document_bytes;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            gate,
            allow_test_mode,
            max_document_bytes,
        })
    }
}

/// Build the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .max_document_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(api::handle_health))
        // API endpoints
        .route("/api/login", post(api::handle_login))
        .route("/api/analyze", post(api::handle_analyze))
        // Apply middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    if state.allow_test_mode {
        warn!("Test mode is enabled: clients may make the server read local files");
    }
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
