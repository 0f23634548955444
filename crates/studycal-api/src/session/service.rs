//! Learner-driven session transitions.
//!
//! Completing or skipping a session reads and writes the plan's sessions and
//! the topic's statistics, so both run under the plan lock like a rebalance.

use chrono::NaiveDate;
use sqlx::PgConnection;
use studycal_db::{
    models::{SessionRow, StudyPlan, records_from_rows},
    repositories::{progress, session, topic},
};
use studycal_planner::{
    CompletionInput, PlanLedger, Quality, ScheduledReview, SessionDraft, SessionRecord,
    SessionStatus, TopicCatalog, TopicRef,
    topic::{hours_to_minutes, unit_title},
};
use uuid::Uuid;

use super::model::{
    CompleteSessionRequest, CompletionResponse, SessionResponse, SkipResponse, SkipSessionRequest,
};
use crate::{
    ApiState,
    error::ApiError,
    metrics,
    plan::service::{load_frame, lock_active},
    validation::{validate_hours, validate_skip_reason},
};

fn session_not_found(session_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Session {session_id}"))
}

fn not_open(row: &SessionRow, action: &str) -> ApiError {
    ApiError::Conflict(format!(
        "Session {} is {} and cannot be {action}",
        row.id, row.status
    ))
}

/// Lock the session's plan, then read the session again under the lock.
async fn load_for_update(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> Result<(StudyPlan, SessionRow), ApiError> {
    let row = session::find_by_id(&mut *conn, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    let plan = lock_active(conn, row.plan_id).await?;

    let row = session::find_by_id(&mut *conn, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    Ok((plan, row))
}

/// Title used in session notes, e.g. `Cells (Mitosis)`.
async fn title_for(
    conn: &mut PgConnection,
    plan_id: Uuid,
    topic_ref: &TopicRef,
) -> Result<String, ApiError> {
    let catalog = TopicCatalog::new(topic::list_for_plan(&mut *conn, plan_id).await?)?;
    let topic = catalog.get(topic_ref.topic_id())?;
    Ok(unit_title(topic, topic_ref))
}

async fn records_for(
    conn: &mut PgConnection,
    plan_id: Uuid,
) -> Result<Vec<SessionRecord>, ApiError> {
    Ok(records_from_rows(&session::list_for_plan(&mut *conn, plan_id).await?)?)
}

/// Persist a scheduled review, shortening the session that makes room for it.
///
/// # Returns
/// The review session id and the id of the shortened session, if any.
async fn write_review(
    conn: &mut PgConnection,
    plan_id: Uuid,
    review: &ScheduledReview,
) -> Result<(Option<Uuid>, Option<Uuid>), ApiError> {
    match review {
        ScheduledReview::Existing { session_id, .. } => Ok((Some(*session_id), None)),
        ScheduledReview::New { draft, trimmed } => {
            if let Some(trim) = trimmed {
                let minutes = i32::try_from(trim.minutes).unwrap_or(i32::MAX);
                if !session::shorten_pending(&mut *conn, trim.session_id, minutes).await? {
                    // The session left the pending state after it was read
                    return Err(ApiError::ConcurrentModification);
                }
            }
            let id = insert_draft(conn, plan_id, draft).await?;
            Ok((id, trimmed.map(|t| t.session_id)))
        }
    }
}

async fn insert_draft(
    conn: &mut PgConnection,
    plan_id: Uuid,
    draft: &SessionDraft,
) -> Result<Option<Uuid>, ApiError> {
    let ids = session::insert_many(conn, plan_id, std::slice::from_ref(draft)).await?;
    Ok(ids.into_iter().next())
}

/// `pending → in_progress`
pub async fn start_session(
    state: &ApiState,
    session_id: Uuid,
) -> Result<SessionResponse, ApiError> {
    let mut tx = state.pool.begin().await?;
    let (_, row) = load_for_update(&mut tx, session_id).await?;

    if !session::mark_started(&mut *tx, session_id).await? {
        return Err(not_open(&row, "started"));
    }
    let row = session::find_by_id(&mut *tx, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    tx.commit().await?;

    tracing::info!(%session_id, plan_id = %row.plan_id, "session started");
    Ok(row.into())
}

/// Record a completed session, update the topic's SM-2 statistics and place the next review.
///
/// # Arguments
/// * `request` - Quality (0-5, default 3) and hours actually spent (default: as scheduled)
/// * `today` - Day the completion is recorded; the review is searched for after it
pub async fn complete_session(
    state: &ApiState,
    session_id: Uuid,
    request: &CompleteSessionRequest,
    today: NaiveDate,
) -> Result<CompletionResponse, ApiError> {
    let quality = request
        .quality
        .map(Quality::new)
        .transpose()?
        .unwrap_or_default();
    if let Some(hours) = request.completed_hours {
        validate_hours("completed_hours", hours)?;
    }

    let mut tx = state.pool.begin().await?;
    let (plan, row) = load_for_update(&mut tx, session_id).await?;
    let mut record = row.to_record()?;

    let completed_minutes = request
        .completed_hours
        .map_or(record.minutes, hours_to_minutes);
    let stored_minutes = i32::try_from(completed_minutes).unwrap_or(i32::MAX);
    if !session::mark_completed(&mut *tx, session_id, stored_minutes, i16::from(quality.value()))
        .await?
    {
        return Err(not_open(&row, "completed"));
    }
    record.status = SessionStatus::Completed;
    record.completed_minutes = Some(completed_minutes);

    let topic_id = record.topic.topic_id();
    let frame = load_frame(&mut tx, &plan).await?;
    let title = title_for(&mut tx, plan.id, &record.topic).await?;
    let sessions = records_for(&mut tx, plan.id).await?;
    let previous = progress::get(&mut *tx, plan.id, topic_id)
        .await?
        .unwrap_or_default();

    let completion = state.planner.complete(
        &frame,
        &title,
        &record,
        &previous,
        CompletionInput {
            quality,
            completed_hours: request.completed_hours,
            today,
        },
        &sessions,
    );

    progress::upsert(&mut *tx, plan.id, topic_id, &completion.progress).await?;
    let (next_review_session_id, shortened_session_id) = match &completion.review {
        Some(review) => write_review(&mut tx, plan.id, review).await?,
        None => (None, None),
    };

    tx.commit().await?;

    tracing::info!(
        %session_id,
        plan_id = %plan.id,
        quality = quality.value(),
        interval_days = completion.progress.interval_days,
        ease_factor = completion.progress.ease_factor,
        review_date = ?completion.review.as_ref().map(ScheduledReview::date),
        shortened = ?shortened_session_id,
        "session completed"
    );
    metrics::record_review_interval(completion.progress.interval_days);
    if matches!(completion.review, Some(ScheduledReview::New { .. })) {
        metrics::record_sessions_generated("complete", 1);
    }

    Ok(CompletionResponse {
        session_id,
        next_review_session_id,
        next_review_date: completion.review.as_ref().map(ScheduledReview::date),
        shortened_session_id,
        new_interval: completion.progress.interval_days,
        new_ease_factor: completion.progress.ease_factor,
    })
}

/// Mark a session skipped and copy it to the next day with room for it.
pub async fn skip_session(
    state: &ApiState,
    session_id: Uuid,
    request: &SkipSessionRequest,
    today: NaiveDate,
) -> Result<SkipResponse, ApiError> {
    let reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if let Some(reason) = reason {
        validate_skip_reason(reason)?;
    }

    let mut tx = state.pool.begin().await?;
    let (plan, row) = load_for_update(&mut tx, session_id).await?;
    let mut record = row.to_record()?;

    if !session::mark_skipped(&mut *tx, session_id, reason).await? {
        return Err(not_open(&row, "skipped"));
    }
    record.status = SessionStatus::Skipped;

    let frame = load_frame(&mut tx, &plan).await?;
    let title = title_for(&mut tx, plan.id, &record.topic).await?;
    let ledger = PlanLedger::from_sessions(&records_for(&mut tx, plan.id).await?);

    let copy = state
        .planner
        .reschedule_skipped(&frame, &title, &record, &ledger, today);
    let new_session_id = match &copy {
        Some(draft) => insert_draft(&mut tx, plan.id, draft).await?,
        None => None,
    };

    tx.commit().await?;

    let new_date = copy.map(|d| d.date);
    tracing::info!(
        %session_id,
        plan_id = %plan.id,
        rescheduled = new_date.is_some(),
        new_date = ?new_date,
        "session skipped"
    );
    if new_session_id.is_some() {
        metrics::record_sessions_generated("skip", 1);
    }

    Ok(SkipResponse {
        session_id,
        rescheduled: new_session_id.is_some(),
        new_session_id,
        new_date,
    })
}
