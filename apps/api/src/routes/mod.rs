pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::patching::handlers::{handle_apply, handle_extract};
use crate::proposals::handlers::handle_propose;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route("/api/v1/resume/extract", post(handle_extract))
        .route("/api/v1/resume/proposals", post(handle_propose))
        .route("/api/v1/resume/apply", post(handle_apply))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
