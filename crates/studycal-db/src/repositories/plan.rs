use chrono::NaiveDate;
use sqlx::{Executor, PgConnection, Postgres};
use studycal_planner::WeeklyCapacity;
use uuid::Uuid;

use crate::models::{CapacityRow, PlanStatus, StudyPlan, capacity_from_rows};

pub async fn find_by_id<'e, E>(executor: E, plan_id: Uuid) -> Result<Option<StudyPlan>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, start_date, exam_date, total_estimated_hours, status, created_at,
                   updated_at
            FROM study_plans
            WHERE id = $1
        "#,
    )
    .bind(plan_id)
    .fetch_optional(executor)
    .await
}

/// Lock the plan row for the rest of the transaction.
///
/// Fails immediately with SQLSTATE `55P03` if another transaction holds the lock.
pub async fn lock<'e, E>(executor: E, plan_id: Uuid) -> Result<Option<StudyPlan>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, start_date, exam_date, total_estimated_hours, status, created_at,
                   updated_at
            FROM study_plans
            WHERE id = $1
            FOR UPDATE NOWAIT
        "#,
    )
    .bind(plan_id)
    .fetch_optional(executor)
    .await
}

/// Create the plan or update its dates. A new plan starts out active.
pub async fn upsert<'e, E>(
    executor: E,
    plan_id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    exam_date: NaiveDate,
) -> Result<StudyPlan, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO study_plans (id, user_id, start_date, exam_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id)
            DO UPDATE SET
                start_date = EXCLUDED.start_date,
                exam_date = EXCLUDED.exam_date,
                updated_at = NOW()
            RETURNING id, user_id, start_date, exam_date, total_estimated_hours, status, created_at,
                      updated_at
        "#,
    )
    .bind(plan_id)
    .bind(user_id)
    .bind(start_date)
    .bind(exam_date)
    .fetch_one(executor)
    .await
}

/// Pause every other active plan of the user. Returns how many were paused.
pub async fn pause_others<'e, E>(executor: E, user_id: Uuid, plan_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_plans
            SET status = $3, updated_at = NOW()
            WHERE user_id = $1 AND id <> $2 AND status = $4
        "#,
    )
    .bind(user_id)
    .bind(plan_id)
    .bind(PlanStatus::Paused.as_str())
    .bind(PlanStatus::Active.as_str())
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Record the catalog's full workload on the plan.
pub async fn set_estimated_hours<'e, E>(
    executor: E,
    plan_id: Uuid,
    hours: f64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_plans
            SET total_estimated_hours = $2, updated_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(plan_id)
    .bind(hours.max(0.0))
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_status<'e, E>(executor: E, plan_id: Uuid, status: PlanStatus) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_plans
            SET status = $2, updated_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(plan_id)
    .bind(status.as_str())
    .execute(executor)
    .await?;
    Ok(())
}

/// Mark active plans whose exam date is on or before `today` completed. Returns how many changed.
pub async fn complete_finished<'e, E>(executor: E, today: NaiveDate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE study_plans
            SET status = $2, updated_at = NOW()
            WHERE status = $3 AND exam_date <= $1
        "#,
    )
    .bind(today)
    .bind(PlanStatus::Completed.as_str())
    .bind(PlanStatus::Active.as_str())
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_active_ids<'e, E>(executor: E) -> Result<Vec<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT id
            FROM study_plans
            WHERE status = $1
            ORDER BY created_at
        "#,
    )
    .bind(PlanStatus::Active.as_str())
    .fetch_all(executor)
    .await
}

pub async fn get_capacity<'e, E>(executor: E, plan_id: Uuid) -> Result<WeeklyCapacity, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<CapacityRow> = sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT weekday, hours
            FROM plan_weekly_capacity
            WHERE plan_id = $1
            ORDER BY weekday
        "#,
    )
    .bind(plan_id)
    .fetch_all(executor)
    .await?;

    capacity_from_rows(&rows)
}

/// Replace the plan's capacity table with `capacity`.
pub async fn replace_capacity(
    conn: &mut PgConnection,
    plan_id: Uuid,
    capacity: &WeeklyCapacity,
) -> Result<(), sqlx::Error> {
    let (weekdays, hours): (Vec<i16>, Vec<f64>) = capacity
        .pairs()
        .map(|(weekday, hours)| (weekday.num_days_from_monday() as i16, hours))
        .unzip();

    sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM plan_weekly_capacity
            WHERE plan_id = $1
        "#,
    )
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO plan_weekly_capacity (plan_id, weekday, hours)
            SELECT $1, weekday, hours
            FROM UNNEST($2::smallint[], $3::float8[]) AS t(weekday, hours)
        "#,
    )
    .bind(plan_id)
    .bind(weekdays)
    .bind(hours)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
