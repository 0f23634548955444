//! Transactional plan operations.
//!
//! Every mutation locks the plan row first (`FOR UPDATE NOWAIT`), so deleting
//! pending sessions and inserting their replacements is one atomic unit per
//! plan. Losing the lock race surfaces as [`ApiError::ConcurrentModification`].

use chrono::NaiveDate;
use sqlx::PgConnection;
use studycal_db::{
    models::{PlanStatus, StudyPlan, records_from_rows},
    repositories::{plan, progress, session, topic},
};
use studycal_planner::{Calendar, PlanFrame, Planner, TopicCatalog};
use uuid::Uuid;

use super::model::{
    CalendarResponse, FeasibilityResponse, GenerateCalendarRequest, PlanDefinition, PlanResponse,
    ProgressResponse, SessionRangeQuery,
};
use crate::{
    ApiState, error::ApiError, metrics, session::model::SessionResponse,
    validation::validate_date_range,
};

/// Skip reason recorded by the daily sweep
pub const MISSED_REASON: &str = "missed";

fn plan_not_found(plan_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Plan {plan_id}"))
}

fn ensure_active(plan: &StudyPlan) -> Result<(), ApiError> {
    if plan.is_active() {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Plan {} is {} and cannot be changed",
            plan.id, plan.status
        )))
    }
}

/// Lock an active plan for the rest of the transaction.
pub(crate) async fn lock_active(
    conn: &mut PgConnection,
    plan_id: Uuid,
) -> Result<StudyPlan, ApiError> {
    let plan = plan::lock(&mut *conn, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    ensure_active(&plan)?;
    Ok(plan)
}

pub(crate) async fn load_frame(
    conn: &mut PgConnection,
    plan: &StudyPlan,
) -> Result<PlanFrame, ApiError> {
    let capacity = plan::get_capacity(&mut *conn, plan.id).await?;
    Ok(PlanFrame::new(plan.start_date, plan.exam_date, capacity)?)
}

/// Replace the pending sessions a calendar supersedes, insert its new ones and
/// record the plan's estimated workload.
///
/// # Returns
/// The number of sessions inserted.
async fn write_calendar(
    conn: &mut PgConnection,
    plan_id: Uuid,
    calendar: &Calendar,
) -> Result<usize, ApiError> {
    let deleted = session::delete_pending(&mut *conn, &calendar.replaced).await?;
    if deleted != calendar.replaced.len() as u64 {
        // A replaced session left the pending state after it was read
        return Err(ApiError::ConcurrentModification);
    }

    let ids = session::insert_many(conn, plan_id, &calendar.sessions).await?;
    plan::set_estimated_hours(&mut *conn, plan_id, calendar.estimated_hours).await?;
    Ok(ids.len())
}

/// Dry run of the feasibility check; nothing is read or written.
pub fn check_feasibility(
    state: &ApiState,
    plan_id: Uuid,
    definition: &PlanDefinition,
) -> Result<FeasibilityResponse, ApiError> {
    let (frame, catalog) = definition.to_engine()?;
    let report = state.planner.check_feasibility(&frame, catalog.topics())?;
    Ok(FeasibilityResponse::new(plan_id, report))
}

/// Create or update a plan and regenerate its calendar from the start date.
///
/// Infeasible plans are refused before the transaction opens. Completed,
/// skipped and in-progress sessions are kept; the learner's other active plans
/// are paused.
pub async fn generate_calendar(
    state: &ApiState,
    plan_id: Uuid,
    request: &GenerateCalendarRequest,
) -> Result<CalendarResponse, ApiError> {
    let (frame, catalog) = request.plan.to_engine()?;
    state.planner.check_feasibility(&frame, catalog.topics())?;

    let mut tx = state.pool.begin().await?;

    if let Some(existing) = plan::lock(&mut *tx, plan_id).await? {
        if existing.user_id != request.user_id {
            return Err(ApiError::Conflict(format!(
                "Plan {plan_id} belongs to another user"
            )));
        }
        ensure_active(&existing)?;
    }

    plan::upsert(&mut *tx, plan_id, request.user_id, frame.start, frame.exam).await?;
    let paused = plan::pause_others(&mut *tx, request.user_id, plan_id).await?;
    plan::replace_capacity(&mut tx, plan_id, &frame.capacity).await?;
    topic::replace_for_plan(&mut tx, plan_id, catalog.topics()).await?;

    let existing = records_from_rows(&session::list_for_plan(&mut *tx, plan_id).await?)?;
    let stats = progress::map_for_plan(&mut *tx, plan_id).await?;
    let calendar = state.planner.generate(&frame, &catalog, &existing, &stats)?;
    let created = write_calendar(&mut tx, plan_id, &calendar).await?;
    let sessions = session::list_for_plan(&mut *tx, plan_id).await?;

    tx.commit().await?;

    tracing::info!(
        %plan_id,
        user_id = %request.user_id,
        strategy = calendar.strategy,
        created,
        replaced = calendar.replaced.len(),
        paused,
        "calendar generated"
    );
    metrics::record_sessions_generated("generate", created);

    Ok(CalendarResponse {
        success: true,
        plan_id,
        strategy: calendar.strategy,
        total_estimated_hours: calendar.estimated_hours,
        feasibility: calendar.report,
        replaced: calendar.replaced.len(),
        created,
        sessions: sessions.into_iter().map(SessionResponse::from).collect(),
    })
}

/// Rebuild a locked plan's calendar from `from` using the stored catalog and history.
async fn rebalance_locked(
    conn: &mut PgConnection,
    planner: &Planner,
    plan: &StudyPlan,
    from: NaiveDate,
) -> Result<(Calendar, usize), ApiError> {
    let frame = load_frame(conn, plan).await?;
    let catalog = TopicCatalog::new(topic::list_for_plan(&mut *conn, plan.id).await?)?;
    let existing = records_from_rows(&session::list_for_plan(&mut *conn, plan.id).await?)?;
    let stats = progress::map_for_plan(&mut *conn, plan.id).await?;

    let calendar = planner.rebalance(&frame, &catalog, &existing, &stats, from)?;
    let created = write_calendar(conn, plan.id, &calendar).await?;
    Ok((calendar, created))
}

/// Regenerate the pending part of a calendar from `from` on.
///
/// History (anything not pending, and pending sessions before `from`) is never
/// touched, so repeating the call with the same date yields the same sessions.
pub async fn rebalance_plan(
    state: &ApiState,
    plan_id: Uuid,
    from: NaiveDate,
) -> Result<CalendarResponse, ApiError> {
    let mut tx = state.pool.begin().await?;
    let stored = lock_active(&mut tx, plan_id).await?;
    let (calendar, created) = rebalance_locked(&mut tx, &state.planner, &stored, from).await?;
    let sessions = session::list_for_plan(&mut *tx, plan_id).await?;
    tx.commit().await?;

    tracing::info!(
        %plan_id,
        %from,
        strategy = calendar.strategy,
        created,
        replaced = calendar.replaced.len(),
        "plan rebalanced"
    );
    metrics::record_sessions_generated("rebalance", created);

    Ok(CalendarResponse {
        success: true,
        plan_id,
        strategy: calendar.strategy,
        total_estimated_hours: calendar.estimated_hours,
        feasibility: calendar.report,
        replaced: calendar.replaced.len(),
        created,
        sessions: sessions.into_iter().map(SessionResponse::from).collect(),
    })
}

/// Skip the plan's pending sessions dated before `today` and rebalance from `today`.
///
/// The skips are kept even when the remaining workload no longer fits; the
/// plan is then left for the learner to fix.
///
/// # Returns
/// The number of sessions marked missed.
pub async fn sweep_missed_sessions(
    state: &ApiState,
    plan_id: Uuid,
    today: NaiveDate,
) -> Result<u64, ApiError> {
    let mut tx = state.pool.begin().await?;

    let Some(stored) = plan::lock(&mut *tx, plan_id).await? else {
        return Ok(0);
    };
    if !stored.is_active() {
        return Ok(0);
    }

    let missed = session::skip_missed(&mut *tx, plan_id, today, MISSED_REASON).await?;
    if missed > 0 && today < stored.exam_date {
        match rebalance_locked(&mut tx, &state.planner, &stored, today).await {
            Ok((_, created)) => {
                tracing::debug!(%plan_id, missed, created, "plan rebalanced after missed sessions");
                metrics::record_sessions_generated("sweep", created);
            }
            Err(ApiError::Planner(e)) if e.is_rejection() => {
                tracing::warn!(%plan_id, missed, reason = %e, "missed sessions left the plan infeasible");
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit().await?;
    Ok(missed)
}

pub async fn get_plan(state: &ApiState, plan_id: Uuid) -> Result<PlanResponse, ApiError> {
    let stored = plan::find_by_id(&state.pool, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    Ok(stored.into())
}

/// Cancel an active or paused plan. Its sessions stay as they are.
pub async fn cancel_plan(state: &ApiState, plan_id: Uuid) -> Result<PlanResponse, ApiError> {
    let mut tx = state.pool.begin().await?;
    let stored = plan::lock(&mut *tx, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    if !stored.status()?.is_open() {
        return Err(ApiError::Conflict(format!(
            "Plan {plan_id} is {} and cannot be cancelled",
            stored.status
        )));
    }

    plan::set_status(&mut *tx, plan_id, PlanStatus::Cancelled).await?;
    let cancelled = plan::find_by_id(&mut *tx, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    tx.commit().await?;

    tracing::info!(%plan_id, previous = %stored.status, "plan cancelled");
    Ok(cancelled.into())
}

/// Sessions of a plan, by default over its whole span.
pub async fn list_sessions(
    state: &ApiState,
    plan_id: Uuid,
    query: &SessionRangeQuery,
) -> Result<Vec<SessionResponse>, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        validate_date_range(from, to)?;
    }

    let stored = plan::find_by_id(&state.pool, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    let from = query.from.unwrap_or(stored.start_date);
    let to = query.to.unwrap_or(stored.exam_date);

    let rows = session::list_in_range(&state.pool, plan_id, from, to).await?;
    Ok(rows.into_iter().map(SessionResponse::from).collect())
}

pub async fn list_progress(
    state: &ApiState,
    plan_id: Uuid,
) -> Result<Vec<ProgressResponse>, ApiError> {
    plan::find_by_id(&state.pool, plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;

    let rows = progress::list_for_plan(&state.pool, plan_id).await?;
    Ok(rows.into_iter().map(ProgressResponse::from).collect())
}
