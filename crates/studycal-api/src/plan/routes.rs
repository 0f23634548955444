use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use super::{
    model::{
        CalendarResponse, FeasibilityResponse, GenerateCalendarRequest, PlanDefinition,
        PlanResponse, ProgressResponse, RebalanceRequest, SessionRangeQuery,
    },
    service,
};
use crate::{
    ApiState, error::ApiError, metrics, retry::retry_once, session::model::SessionResponse,
    validation,
};

/// Create the plan routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/plans/{plan_id}", get(get_plan))
        .route("/plans/{plan_id}/cancel", post(cancel_plan))
        .route("/plans/{plan_id}/feasibility", post(check_feasibility))
        .route("/plans/{plan_id}/calendar", post(generate_calendar))
        .route("/plans/{plan_id}/rebalance", post(rebalance))
        .route("/plans/{plan_id}/sessions", get(list_sessions))
        .route("/plans/{plan_id}/progress", get(list_progress))
}

/// Check whether a plan fits before the exam, without storing anything
async fn check_feasibility(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<PlanDefinition>,
) -> Result<Json<FeasibilityResponse>, ApiError> {
    validation::validate_request(&payload)?;

    let result = service::check_feasibility(&state, plan_id, &payload);
    metrics::record_calendar_event("feasibility", &result);
    Ok(Json(result?))
}

/// Store the plan and generate its calendar
async fn generate_calendar(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<GenerateCalendarRequest>,
) -> Result<(StatusCode, Json<CalendarResponse>), ApiError> {
    validation::validate_request(&payload)?;

    let result = retry_once("generate", || {
        service::generate_calendar(&state, plan_id, &payload)
    })
    .await;
    metrics::record_calendar_event("generate", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// Regenerate the pending sessions from `from_date` (default: today)
async fn rebalance(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<RebalanceRequest>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let from = payload
        .from_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let result = retry_once("rebalance", || service::rebalance_plan(&state, plan_id, from)).await;
    metrics::record_calendar_event("rebalance", &result);
    Ok(Json(result?))
}

async fn get_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = service::get_plan(&state, plan_id).await?;
    Ok(Json(plan))
}

/// Cancel an active or paused plan
async fn cancel_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<PlanResponse>, ApiError> {
    let result = retry_once("cancel", || service::cancel_plan(&state, plan_id)).await;
    metrics::record_calendar_event("cancel", &result);
    Ok(Json(result?))
}

async fn list_sessions(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
    Query(query): Query<SessionRangeQuery>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = service::list_sessions(&state, plan_id, &query).await?;
    Ok(Json(sessions))
}

async fn list_progress(
    State(state): State<ApiState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Vec<ProgressResponse>>, ApiError> {
    let progress = service::list_progress(&state, plan_id).await?;
    Ok(Json(progress))
}
