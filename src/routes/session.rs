use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::app_state::AppState;
use crate::models::queue::QueueView;

#[derive(Debug, Serialize)]
pub struct SessionView {
    /// True until the operator has answered the resume-or-discard prompt.
    pub needs_decision: bool,
    pub pending: usize,
}

/// GET /api/v1/session — whether unfinished work from a previous session
/// awaits a resume/discard decision.
pub async fn session_view(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView {
        needs_decision: state.session.needs_decision(),
        pending: state.queue.pending_count().await,
    })
}

/// POST /api/v1/session/resume — start draining the restored queue.
/// The prompt is single-shot: a second answer gets 409.
pub async fn resume_session(
    State(state): State<AppState>,
) -> Result<Json<QueueView>, StatusCode> {
    if !state.session.decide() {
        return Err(StatusCode::CONFLICT);
    }
    info!("operator chose to resume previous session's queue");
    state.queue.start_processing().await;
    Ok(Json(state.queue.view().await))
}

/// POST /api/v1/session/discard — drop the restored queue and counters.
pub async fn discard_session(
    State(state): State<AppState>,
) -> Result<Json<QueueView>, StatusCode> {
    if !state.session.decide() {
        return Err(StatusCode::CONFLICT);
    }
    info!("operator chose to discard previous session's queue");
    state.queue.clear().await;
    Ok(Json(state.queue.view().await))
}
