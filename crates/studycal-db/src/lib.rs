//! PostgreSQL persistence for study plans
//!
//! Five tables back the engine: `study_plans` (dates, status and estimated
//! workload), `plan_weekly_capacity`, the `plan_topics` catalog snapshot,
//! `study_sessions` (durations in whole minutes) and `topic_progress_stats`
//! with the SM-2 state per topic. [`models`] holds the rows and their
//! conversions into planner types; [`repositories`] holds the queries, one
//! module per table.

pub mod models;
pub mod repositories;

use std::time::Duration;

use anyhow::Context;
use sqlx::{PgPool, Postgres, migrate::MigrateDatabase, postgres::PgPoolOptions};

/// How long a request waits for a free connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect a pool of at most `max_connections` connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .context("failed to connect to the study plan database")
}

/// Create the database when missing, then apply the bundled schema migrations.
pub async fn ensure_db_and_migrate(database_url: &str, pool: &PgPool) -> anyhow::Result<()> {
    if !Postgres::database_exists(database_url).await? {
        tracing::info!("creating study plan database");
        Postgres::create_database(database_url)
            .await
            .context("failed to create the study plan database")?;
    }

    sqlx::migrate!()
        .run(pool)
        .await
        .context("failed to migrate the study plan schema")?;
    tracing::debug!("study plan schema is up to date");

    Ok(())
}
