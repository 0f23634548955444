//! Background jobs for periodic maintenance tasks.
//!
//! The missed-session sweep is the automatic rebalance trigger: sessions
//! nobody completed or skipped by the end of their day are marked skipped and
//! the rest of the plan is regenerated around them. Plans whose exam date has
//! arrived are marked completed first and left alone.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use studycal_db::repositories::plan;
use tokio::time::interval;

use crate::{
    ApiState, error::ApiError, metrics, plan::service::sweep_missed_sessions, retry::retry_once,
};

/// Start all background jobs
///
/// Returns a vector of join handles that can be awaited on shutdown
pub fn start_background_jobs(state: ApiState) -> Vec<tokio::task::JoinHandle<()>> {
    vec![tokio::spawn(periodic_missed_session_sweep(state))]
}

/// Outcome of one sweep over all active plans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub plans_completed: u64,
    pub plans: usize,
    pub sessions_missed: u64,
    pub failed: usize,
}

/// Run the missed-session sweep once a day
async fn periodic_missed_session_sweep(state: ApiState) {
    // Wait a few minutes before the first run to avoid startup contention
    tokio::time::sleep(Duration::from_secs(300)).await;

    let mut interval = interval(Duration::from_secs(86400)); // 24 hours

    loop {
        interval.tick().await;

        let today = Utc::now().date_naive();
        match sweep_all_plans(&state, today).await {
            Ok(summary)
                if summary.sessions_missed > 0
                    || summary.failed > 0
                    || summary.plans_completed > 0 =>
            {
                tracing::info!(
                    completed = summary.plans_completed,
                    plans = summary.plans,
                    missed = summary.sessions_missed,
                    failed = summary.failed,
                    "Missed-session sweep complete"
                );
            }
            Ok(summary) => {
                tracing::debug!(plans = summary.plans, "Missed-session sweep: nothing missed");
            }
            Err(e) => {
                tracing::error!("Failed to run missed-session sweep: {e}");
            }
        }
    }
}

/// Sweep every active plan; a failing plan is logged and does not stop the others
pub async fn sweep_all_plans(state: &ApiState, today: NaiveDate) -> Result<SweepSummary, ApiError> {
    let plans_completed = plan::complete_finished(&state.pool, today).await?;
    let plan_ids = plan::list_active_ids(&state.pool).await?;
    let mut summary = SweepSummary {
        plans_completed,
        plans: plan_ids.len(),
        ..SweepSummary::default()
    };

    for plan_id in plan_ids {
        let result = retry_once("sweep", || sweep_missed_sessions(state, plan_id, today)).await;
        metrics::record_calendar_event("sweep", &result);
        match result {
            Ok(missed) => summary.sessions_missed += missed,
            Err(e) => {
                tracing::error!(%plan_id, "Failed to sweep plan: {e}");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
