use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use chrono::Utc;
use uuid::Uuid;

use super::{
    model::{
        CompleteSessionRequest, CompletionResponse, SessionResponse, SkipResponse,
        SkipSessionRequest,
    },
    service,
};
use crate::{ApiState, error::ApiError, metrics, retry::retry_once};

/// Create the session routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/sessions/{session_id}/start", post(start_session))
        .route("/sessions/{session_id}/complete", post(complete_session))
        .route("/sessions/{session_id}/skip", post(skip_session))
}

async fn start_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let result = retry_once("start", || service::start_session(&state, session_id)).await;
    metrics::record_calendar_event("start", &result);
    Ok(Json(result?))
}

/// Complete a session and schedule its spaced-repetition review
async fn complete_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CompleteSessionRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let today = Utc::now().date_naive();

    let result = retry_once("complete", || {
        service::complete_session(&state, session_id, &payload, today)
    })
    .await;
    metrics::record_calendar_event("complete", &result);
    Ok(Json(result?))
}

/// Skip a session and look for a make-up day
async fn skip_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SkipSessionRequest>,
) -> Result<Json<SkipResponse>, ApiError> {
    let today = Utc::now().date_naive();

    let result = retry_once("skip", || {
        service::skip_session(&state, session_id, &payload, today)
    })
    .await;
    metrics::record_calendar_event("skip", &result);
    Ok(Json(result?))
}
