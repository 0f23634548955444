use chrono::NaiveDate;
use sqlx::{Executor, Postgres};
use studycal_planner::{ProgressByTopic, TopicProgress};
use uuid::Uuid;

use crate::models::ProgressRow;

/// Stored statistics for a topic, or `None` before its first completion.
pub async fn get<'e, E>(
    executor: E,
    plan_id: Uuid,
    topic_id: Uuid,
) -> Result<Option<TopicProgress>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<ProgressRow> = sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT topic_id, ease_factor, interval_days, success_rate, total_reviews,
                   hours_spent, last_reviewed_at
            FROM topic_progress_stats
            WHERE plan_id = $1 AND topic_id = $2
        "#,
    )
    .bind(plan_id)
    .bind(topic_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(TopicProgress::from))
}

pub async fn list_for_plan<'e, E>(executor: E, plan_id: Uuid) -> Result<Vec<ProgressRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT topic_id, ease_factor, interval_days, success_rate, total_reviews,
                   hours_spent, last_reviewed_at
            FROM topic_progress_stats
            WHERE plan_id = $1
            ORDER BY topic_id
        "#,
    )
    .bind(plan_id)
    .fetch_all(executor)
    .await
}

/// Stored statistics of every topic of a plan, keyed by topic.
pub async fn map_for_plan<'e, E>(executor: E, plan_id: Uuid) -> Result<ProgressByTopic, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = list_for_plan(executor, plan_id).await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.topic_id, TopicProgress::from(row)))
        .collect())
}

pub async fn upsert<'e, E>(
    executor: E,
    plan_id: Uuid,
    topic_id: Uuid,
    progress: &TopicProgress,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let last_reviewed_at: Option<NaiveDate> = progress.last_reviewed_at;
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO topic_progress_stats (plan_id, topic_id, ease_factor, interval_days,
                                              success_rate, total_reviews, hours_spent, last_reviewed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (plan_id, topic_id)
            DO UPDATE SET
                ease_factor = $3,
                interval_days = $4,
                success_rate = $5,
                total_reviews = $6,
                hours_spent = $7,
                last_reviewed_at = $8,
                updated_at = NOW()
        "#,
    )
    .bind(plan_id)
    .bind(topic_id)
    .bind(progress.ease_factor)
    .bind(progress.interval_days as i32)
    .bind(progress.success_rate)
    .bind(progress.total_reviews as i32)
    .bind(progress.hours_spent)
    .bind(last_reviewed_at)
    .execute(executor)
    .await?;
    Ok(())
}
