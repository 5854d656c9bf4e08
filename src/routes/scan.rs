use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::models::queue::QueueView;

/// One raw detection from the barcode source.
#[derive(Debug, Deserialize, Validate)]
pub struct ScanRequest {
    #[garde(length(min = 1, max = 128))]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /api/v1/scan — run a raw detection through the ingestion gate.
/// Rejections are reported in the body, not as HTTP errors.
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ScanResponse>), StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    match state.gate.admit(&request.text).await {
        Ok(code) => Ok((
            StatusCode::ACCEPTED,
            Json(ScanResponse {
                accepted: true,
                code: Some(code),
                reason: None,
            }),
        )),
        Err(rejection) => Ok((
            StatusCode::OK,
            Json(ScanResponse {
                accepted: false,
                code: None,
                reason: Some(rejection.to_string()),
            }),
        )),
    }
}

/// GET /api/v1/queue — current entries, counters, and drain-loop status.
pub async fn queue_view(State(state): State<AppState>) -> Json<QueueView> {
    Json(state.queue.view().await)
}

/// POST /api/v1/queue/start — idempotent.
pub async fn start_queue(State(state): State<AppState>) -> Json<QueueView> {
    state.queue.start_processing().await;
    Json(state.queue.view().await)
}

/// POST /api/v1/queue/stop — cooperative; the in-flight entry completes.
pub async fn stop_queue(State(state): State<AppState>) -> Json<QueueView> {
    state.queue.stop_processing().await;
    Json(state.queue.view().await)
}

/// POST /api/v1/queue/clear — drop all entries and counters.
pub async fn clear_queue(State(state): State<AppState>) -> Json<QueueView> {
    state.queue.clear().await;
    Json(state.queue.view().await)
}

/// DELETE /api/v1/queue/{code} — dismiss every entry for one code.
pub async fn remove_entry(
    State(state): State<AppState>,
    axum::extract::Path(code): axum::extract::Path<String>,
) -> Json<QueueView> {
    state.queue.remove(&code).await;
    Json(state.queue.view().await)
}

/// POST /api/v1/stats/reset — zero the counters, keep the entries.
pub async fn reset_stats(State(state): State<AppState>) -> Json<QueueView> {
    state.queue.reset_stats().await;
    Json(state.queue.view().await)
}
