use super::handlers::{health_check, run_job};
use crate::app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Retention Purge Service" }))
        .route("/health", get(health_check))
        .route("/run", post(run_job))
        .with_state(app_state)
}
