use sqlx::{Executor, PgConnection, Postgres};
use studycal_planner::Topic;
use uuid::Uuid;

use crate::models::PlanTopicRow;

/// Topics of a plan in catalog order.
pub async fn list_for_plan<'e, E>(executor: E, plan_id: Uuid) -> Result<Vec<Topic>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<PlanTopicRow> = sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT topic_id, title, complexity, estimated_hours, sub_parts, block,
                   priority_multiplier, pinned
            FROM plan_topics
            WHERE plan_id = $1
            ORDER BY position
        "#,
    )
    .bind(plan_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Topic::try_from).collect()
}

/// Replace the plan's catalog snapshot.
pub async fn replace_for_plan(
    conn: &mut PgConnection,
    plan_id: Uuid,
    topics: &[Topic],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM plan_topics
            WHERE plan_id = $1
        "#,
    )
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;

    for (position, topic) in topics.iter().enumerate() {
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO plan_topics (plan_id, topic_id, position, title, complexity,
                                         estimated_hours, sub_parts, block, priority_multiplier, pinned)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(plan_id)
        .bind(topic.id)
        .bind(position as i32)
        .bind(&topic.title)
        .bind(topic.complexity.as_str())
        .bind(topic.estimated_hours)
        .bind(&topic.sub_parts)
        .bind(&topic.block)
        .bind(topic.priority_multiplier)
        .bind(topic.pinned)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
