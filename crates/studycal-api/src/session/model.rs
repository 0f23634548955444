use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use studycal_db::models::SessionRow;
use studycal_planner::topic::minutes_to_hours;
use uuid::Uuid;

/// Study session as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    /// Session ID
    pub id: Uuid,
    /// Plan the session belongs to
    pub plan_id: Uuid,
    /// Topic studied in the session
    pub topic_id: Uuid,
    /// Sub-part of the topic, if the topic is split
    pub sub_part_label: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_hours: f64,
    /// `pending`, `in_progress`, `completed` or `skipped`
    pub status: String,
    /// `study`, `review` or `test`
    pub role: String,
    /// `rotation` for the generated calendar, `repetition` for reviews placed after a completion
    pub origin: String,
    pub review_stage: Option<i32>,
    pub notes: String,
    /// Hours actually spent, once completed
    pub completed_hours: Option<f64>,
    /// Recall quality reported on completion (0-5)
    pub quality: Option<i16>,
    pub skip_reason: Option<String>,
}

impl From<SessionRow> for SessionResponse {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            plan_id: row.plan_id,
            topic_id: row.topic_id,
            sub_part_label: row.sub_part_label,
            scheduled_date: row.scheduled_date,
            scheduled_hours: minutes_to_hours(u32::try_from(row.scheduled_minutes).unwrap_or(0)),
            status: row.status,
            role: row.role,
            origin: row.origin,
            review_stage: row.review_stage,
            notes: row.notes,
            completed_hours: row
                .completed_minutes
                .and_then(|m| u32::try_from(m).ok())
                .map(minutes_to_hours),
            quality: row.quality,
            skip_reason: row.skip_reason,
        }
    }
}

/// Request body of `POST /sessions/{session_id}/complete`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteSessionRequest {
    /// Recall quality 0-5; defaults to 3
    pub quality: Option<u8>,
    /// Time actually spent; defaults to the scheduled length
    pub completed_hours: Option<f64>,
}

/// Result of a completion
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub session_id: Uuid,
    /// Review placed by the spaced-repetition scheduler, absent when no day before the exam had room
    pub next_review_session_id: Option<Uuid>,
    pub next_review_date: Option<NaiveDate>,
    /// Pending session shortened to fit the review on its date
    pub shortened_session_id: Option<Uuid>,
    pub new_interval: u32,
    pub new_ease_factor: f64,
}

/// Request body of `POST /sessions/{session_id}/skip`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkipSessionRequest {
    pub reason: Option<String>,
}

/// Result of a skip
#[derive(Debug, Clone, Serialize)]
pub struct SkipResponse {
    pub session_id: Uuid,
    /// Whether a make-up copy was scheduled
    pub rescheduled: bool,
    pub new_session_id: Option<Uuid>,
    pub new_date: Option<NaiveDate>,
}
