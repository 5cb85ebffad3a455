//! Job Dispatcher (C6): HTTP surface, admission control, and pipeline
//! wiring. Router assembly follows the teacher's `tinyzkp_api` shape
//! (`Router::new().route(...).with_state(...).layer(TraceLayer::new_for_http())`),
//! generalized from a many-endpoint SaaS façade down to this service's single
//! job-submission endpoint plus a health check.

mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared, read-only (aside from the semaphore) application state.
pub struct AppState {
    pub config: Config,
    pub semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self { config, semaphore }
    }
}

/// Build the full axum router (§4.6, §6). The job-submission route is
/// `POST /reconstruir`, the exact path named in the external interface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/reconstruir", post(handlers::reconstruct))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
