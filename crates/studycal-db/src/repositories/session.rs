use chrono::NaiveDate;
use sqlx::{Executor, PgConnection, Postgres, QueryBuilder};
use studycal_planner::{SessionDraft, SessionStatus};
use uuid::Uuid;

use crate::models::SessionRow;

/// Rows per multi-row INSERT.
pub const INSERT_BATCH_SIZE: usize = 500;

macro_rules! select_sessions {
    ($tail:literal) => {
        concat!(
            "SELECT id, plan_id, topic_id, part_index, sub_part_label, scheduled_date, \
             scheduled_minutes, status, role, origin, review_stage, notes, completed_minutes, \
             quality, skip_reason FROM study_sessions ",
            $tail
        )
    };
}

pub async fn find_by_id<'e, E>(executor: E, session_id: Uuid) -> Result<Option<SessionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        select_sessions!("WHERE id = $1"),
    )
    .bind(session_id)
    .fetch_optional(executor)
    .await
}

/// Every session of a plan, oldest first.
pub async fn list_for_plan<'e, E>(executor: E, plan_id: Uuid) -> Result<Vec<SessionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        select_sessions!("WHERE plan_id = $1 ORDER BY scheduled_date, created_at, id"),
    )
    .bind(plan_id)
    .fetch_all(executor)
    .await
}

/// Sessions of a plan within `[from, to]`.
pub async fn list_in_range<'e, E>(
    executor: E,
    plan_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<SessionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        select_sessions!(
            "WHERE plan_id = $1 AND scheduled_date BETWEEN $2 AND $3 \
             ORDER BY scheduled_date, created_at, id"
        ),
    )
    .bind(plan_id)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
}

/// Delete the given sessions, as long as they are still pending.
pub async fn delete_pending<'e, E>(executor: E, ids: &[Uuid]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM study_sessions
            WHERE id = ANY($1) AND status = $2
        "#,
    )
    .bind(ids)
    .bind(SessionStatus::Pending.as_str())
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Insert drafts in batches of [`INSERT_BATCH_SIZE`]. Returns the new ids in draft order.
pub async fn insert_many(
    conn: &mut PgConnection,
    plan_id: Uuid,
    drafts: &[SessionDraft],
) -> Result<Vec<Uuid>, sqlx::Error> {
    let ids: Vec<Uuid> = drafts.iter().map(|_| Uuid::new_v4()).collect();

    for (chunk, chunk_ids) in drafts.chunks(INSERT_BATCH_SIZE).zip(ids.chunks(INSERT_BATCH_SIZE)) {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            // language=PostgreSQL
            "INSERT INTO study_sessions (id, plan_id, topic_id, part_index, sub_part_label, \
             scheduled_date, scheduled_minutes, status, role, origin, review_stage, notes) ",
        );
        builder.push_values(chunk.iter().zip(chunk_ids), |mut row, (draft, id)| {
            row.push_bind(*id)
                .push_bind(plan_id)
                .push_bind(draft.topic.topic_id())
                .push_bind(draft.topic.part_index().map(|p| p as i16))
                .push_bind(draft.topic.label().map(str::to_string))
                .push_bind(draft.date)
                .push_bind(draft.minutes as i32)
                .push_bind(SessionStatus::Pending.as_str())
                .push_bind(draft.role.as_str())
                .push_bind(draft.origin.as_str())
                .push_bind(draft.review_stage.map(|s| s as i32))
                .push_bind(draft.note.clone());
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(ids)
}

/// Shorten a pending session to `minutes`. Returns false if it is no longer pending.
pub async fn shorten_pending<'e, E>(
    executor: E,
    session_id: Uuid,
    minutes: i32,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET scheduled_minutes = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
        "#,
    )
    .bind(session_id)
    .bind(minutes)
    .bind(SessionStatus::Pending.as_str())
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// `pending → in_progress`. Returns false if the session was not pending.
pub async fn mark_started<'e, E>(executor: E, session_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET status = 'in_progress', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(session_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a pending or in-progress session completed.
pub async fn mark_completed<'e, E>(
    executor: E,
    session_id: Uuid,
    completed_minutes: i32,
    quality: i16,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET status = 'completed',
                completed_minutes = $2,
                quality = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'in_progress')
        "#,
    )
    .bind(session_id)
    .bind(completed_minutes)
    .bind(quality)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a pending or in-progress session skipped.
pub async fn mark_skipped<'e, E>(
    executor: E,
    session_id: Uuid,
    reason: Option<&str>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET status = 'skipped', skip_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'in_progress')
        "#,
    )
    .bind(session_id)
    .bind(reason)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Skip every pending session of the plan dated before `before`. Returns how many were skipped.
pub async fn skip_missed<'e, E>(
    executor: E,
    plan_id: Uuid,
    before: NaiveDate,
    reason: &str,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_sessions
            SET status = 'skipped', skip_reason = $3, updated_at = NOW()
            WHERE plan_id = $1 AND scheduled_date < $2 AND status = 'pending'
        "#,
    )
    .bind(plan_id)
    .bind(before)
    .bind(reason)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
