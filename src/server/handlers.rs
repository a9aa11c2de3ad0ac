use crate::app_state::AppState;
use crate::error::Error;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed().unwrap_or_default();
    let response = serde_json::json!({
        "status": "ok",
        "uptime": format!("{}s", uptime.as_secs()),
        "message": "Retention purge service is running"
    });
    tracing::debug!("Health check response: {:?}", response);
    Json(response)
}

/// Runs one retention pass. A completed pass answers 200 even when some items
/// failed; an aborted pass answers with an error status.
pub async fn run_job(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let run_span = info_span!("http_triggered_run");

    async {
        info!("Retention run requested over HTTP");

        match state.job.run().await {
            Ok(report) => {
                let status = if report.is_clean() { "completed" } else { "completed_with_failures" };
                (
                    StatusCode::OK,
                    Json(serde_json::json!({ "status": status, "report": report })),
                )
            }
            Err(e) => {
                error!(error = %e, "HTTP triggered run aborted");
                let code = match &e {
                    Error::Config(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    code,
                    Json(serde_json::json!({ "status": "aborted", "error": e.to_string() })),
                )
            }
        }
    }
    .instrument(run_span)
    .await
}
