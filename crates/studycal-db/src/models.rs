use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studycal_planner::{
    Complexity, PlannerError, SessionOrigin, SessionRecord, SessionRole, SessionStatus, Topic,
    TopicProgress, TopicRef, WeeklyCapacity,
};
use uuid::Uuid;

/// Lifecycle state of a study plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    /// The exam date has passed
    Completed,
    /// Another plan of the learner became active
    Paused,
    Cancelled,
}

impl PlanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }

    /// Active and paused plans may still be cancelled.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl FromStr for PlanStatus {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PlannerError::UnknownVariant {
                kind: "plan status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a TEXT column into an engine enum.
fn decode<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = PlannerError>,
{
    value.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Study plan model
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudyPlan {
    /// Unique plan identifier
    pub id: Uuid,
    /// Learner owning the plan
    pub user_id: Uuid,
    /// First day sessions may be scheduled
    pub start_date: NaiveDate,
    /// Exam day; the last session is scheduled the day before
    pub exam_date: NaiveDate,
    /// Study, review and test hours of the whole catalog
    pub total_estimated_hours: f64,
    /// `active`, `completed`, `paused` or `cancelled`
    pub status: String,
    /// When the plan was created
    pub created_at: DateTime<Utc>,
    /// When the plan was last updated
    pub updated_at: DateTime<Utc>,
}

impl StudyPlan {
    pub fn status(&self) -> Result<PlanStatus, sqlx::Error> {
        decode(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active.as_str()
    }
}

/// One weekday of a plan's capacity table
#[derive(Debug, Clone, Copy, FromRow)]
pub struct CapacityRow {
    /// 0 = Monday … 6 = Sunday
    pub weekday: i16,
    pub hours: f64,
}

/// Rebuild the capacity table; weekdays without a row are rest days.
pub fn capacity_from_rows(rows: &[CapacityRow]) -> Result<WeeklyCapacity, sqlx::Error> {
    let pairs = rows.iter().filter_map(|row| {
        let weekday = Weekday::try_from(u8::try_from(row.weekday).ok()?).ok()?;
        Some((weekday, row.hours))
    });
    WeeklyCapacity::from_pairs(pairs).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Topic catalog entry stored with a plan
#[derive(Debug, Clone, FromRow)]
pub struct PlanTopicRow {
    pub topic_id: Uuid,
    pub title: String,
    /// `low`, `medium` or `high`
    pub complexity: String,
    pub estimated_hours: f64,
    /// Ordered sub-part labels (empty for plain topics)
    pub sub_parts: Vec<String>,
    pub block: Option<String>,
    pub priority_multiplier: f64,
    pub pinned: bool,
}

impl TryFrom<PlanTopicRow> for Topic {
    type Error = sqlx::Error;

    fn try_from(row: PlanTopicRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.topic_id,
            title: row.title,
            complexity: decode::<Complexity>(&row.complexity)?,
            estimated_hours: row.estimated_hours,
            sub_parts: row.sub_parts,
            block: row.block,
            priority_multiplier: row.priority_multiplier,
            pinned: row.pinned,
        })
    }
}

/// Study session row
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    /// Unique session identifier
    pub id: Uuid,
    /// Plan this session belongs to (indexed with the date)
    pub plan_id: Uuid,
    pub topic_id: Uuid,
    /// Sub-part position within the topic, if any
    pub part_index: Option<i16>,
    pub sub_part_label: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_minutes: i32,
    /// `pending`, `in_progress`, `completed` or `skipped`
    pub status: String,
    /// `study`, `review` or `test`
    pub role: String,
    /// `rotation` or `repetition`
    pub origin: String,
    /// Rotation counter or review number
    pub review_stage: Option<i32>,
    pub notes: String,
    /// Minutes actually spent, set on completion
    pub completed_minutes: Option<i32>,
    /// Recall quality reported on completion
    pub quality: Option<i16>,
    pub skip_reason: Option<String>,
}

impl SessionRow {
    pub fn topic_ref(&self) -> TopicRef {
        TopicRef::from_columns(self.topic_id, self.part_index, self.sub_part_label.clone())
    }

    pub fn to_record(&self) -> Result<SessionRecord, sqlx::Error> {
        Ok(SessionRecord {
            id: self.id,
            topic: self.topic_ref(),
            date: self.scheduled_date,
            minutes: u32::try_from(self.scheduled_minutes).unwrap_or(0),
            status: decode::<SessionStatus>(&self.status)?,
            role: decode::<SessionRole>(&self.role)?,
            origin: decode::<SessionOrigin>(&self.origin)?,
            review_stage: self.review_stage.and_then(|s| u32::try_from(s).ok()),
            completed_minutes: self.completed_minutes.and_then(|m| u32::try_from(m).ok()),
        })
    }
}

/// Convert a list of rows, failing on the first undecodable one.
pub fn records_from_rows(rows: &[SessionRow]) -> Result<Vec<SessionRecord>, sqlx::Error> {
    rows.iter().map(SessionRow::to_record).collect()
}

/// Topic progress statistics row
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    pub topic_id: Uuid,
    /// SM-2 ease factor, never below 1.3
    pub ease_factor: f64,
    pub interval_days: i32,
    pub success_rate: f64,
    pub total_reviews: i32,
    pub hours_spent: f64,
    pub last_reviewed_at: Option<NaiveDate>,
}

impl From<ProgressRow> for TopicProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            ease_factor: row.ease_factor,
            interval_days: u32::try_from(row.interval_days).unwrap_or(1).max(1),
            success_rate: row.success_rate,
            total_reviews: u32::try_from(row.total_reviews).unwrap_or(0),
            hours_spent: row.hours_spent,
            last_reviewed_at: row.last_reviewed_at,
        }
    }
}
