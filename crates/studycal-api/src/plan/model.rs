use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use studycal_db::models::{ProgressRow, StudyPlan};
use studycal_planner::{
    FeasibilityReport, PlanFrame, Topic, TopicCatalog, WeekdayHours, WeeklyCapacity,
};
use uuid::Uuid;
use validator::Validate;

use crate::{error::ApiError, session::model::SessionResponse};

/// Dates, capacity and catalog of a plan, as sent by the client
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlanDefinition {
    /// First day sessions may be scheduled
    pub start_date: NaiveDate,
    /// Exam day; nothing is scheduled on it
    pub exam_date: NaiveDate,
    /// Study hours available per weekday (`monday`…`sunday`, or `mon`…`sun`)
    pub weekly_capacity: WeekdayHours,
    #[validate(length(min = 1, max = 500, message = "a plan needs between 1 and 500 topics"))]
    pub topics: Vec<Topic>,
}

impl PlanDefinition {
    /// Check the shape of the plan and build the engine inputs.
    pub fn to_engine(&self) -> Result<(PlanFrame, TopicCatalog), ApiError> {
        let capacity = WeeklyCapacity::try_from(self.weekly_capacity)?;
        let frame = PlanFrame::new(self.start_date, self.exam_date, capacity)?;
        let catalog = TopicCatalog::new(self.topics.clone())?;
        Ok((frame, catalog))
    }
}

/// Request body of `POST /plans/{plan_id}/calendar`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateCalendarRequest {
    /// Learner owning the plan
    pub user_id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub plan: PlanDefinition,
}

/// Request body of `POST /plans/{plan_id}/rebalance`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RebalanceRequest {
    /// Cut-off date; defaults to today
    pub from_date: Option<NaiveDate>,
}

/// Query of `GET /plans/{plan_id}/sessions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRangeQuery {
    /// Defaults to the plan's start date
    pub from: Option<NaiveDate>,
    /// Defaults to the plan's exam date
    pub to: Option<NaiveDate>,
}

/// Accepted feasibility check
#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityResponse {
    pub success: bool,
    pub plan_id: Uuid,
    pub required_hours: f64,
    pub available_hours: f64,
    pub margin_hours: f64,
}

impl FeasibilityResponse {
    pub const fn new(plan_id: Uuid, report: FeasibilityReport) -> Self {
        Self {
            success: true,
            plan_id,
            required_hours: report.required_hours,
            available_hours: report.available_hours,
            margin_hours: report.margin_hours,
        }
    }
}

/// Calendar written by a generation or rebalance
#[derive(Debug, Clone, Serialize)]
pub struct CalendarResponse {
    pub success: bool,
    pub plan_id: Uuid,
    /// Rotation strategy that produced the sessions (`cycle` or `phased`)
    pub strategy: &'static str,
    /// Study, review and test hours of the whole catalog
    pub total_estimated_hours: f64,
    pub feasibility: FeasibilityReport,
    /// Pending sessions deleted and replaced
    pub replaced: usize,
    /// Sessions written by this run
    pub created: usize,
    /// Every session of the plan after the run, ordered by date
    pub sessions: Vec<SessionResponse>,
}

/// Study plan as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub exam_date: NaiveDate,
    pub total_estimated_hours: f64,
    /// `active`, `completed`, `paused` or `cancelled`
    pub status: String,
}

impl From<StudyPlan> for PlanResponse {
    fn from(plan: StudyPlan) -> Self {
        Self {
            id: plan.id,
            user_id: plan.user_id,
            start_date: plan.start_date,
            exam_date: plan.exam_date,
            total_estimated_hours: plan.total_estimated_hours,
            status: plan.status,
        }
    }
}

/// Topic progress statistics as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    pub topic_id: Uuid,
    pub ease_factor: f64,
    pub interval_days: i32,
    /// Mean of `quality / 5` over all completions
    pub success_rate: f64,
    pub total_reviews: i32,
    pub hours_spent: f64,
    pub last_reviewed_at: Option<NaiveDate>,
}

impl From<ProgressRow> for ProgressResponse {
    fn from(row: ProgressRow) -> Self {
        Self {
            topic_id: row.topic_id,
            ease_factor: row.ease_factor,
            interval_days: row.interval_days,
            success_rate: row.success_rate,
            total_reviews: row.total_reviews,
            hours_spent: row.hours_spent,
            last_reviewed_at: row.last_reviewed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::validation::validate_request;

    fn body(topics: serde_json::Value) -> serde_json::Value {
        json!({
            "user_id": Uuid::new_v4(),
            "start_date": "2025-01-06",
            "exam_date": "2025-03-07",
            "weekly_capacity": { "mon": 2, "tue": 2, "wed": 2, "thu": 2, "fri": 2 },
            "topics": topics,
        })
    }

    #[test]
    fn test_generate_request_parses_flattened_plan() {
        let request: GenerateCalendarRequest = serde_json::from_value(body(json!([{
            "id": Uuid::new_v4(),
            "title": "Cells",
            "complexity": "medium",
            "estimated_hours": 8.0,
            "sub_parts": ["Membranes", "Mitosis"]
        }])))
        .unwrap();

        assert!(validate_request(&request).is_ok());
        let (frame, catalog) = request.plan.to_engine().unwrap();
        assert_eq!(frame.capacity.weekly_hours(), 10.0);
        assert_eq!(catalog.topics()[0].priority_multiplier, 1.0);
    }

    #[test]
    fn test_empty_topic_list_is_rejected() {
        let request: GenerateCalendarRequest = serde_json::from_value(body(json!([]))).unwrap();
        assert!(matches!(
            validate_request(&request),
            Err(ApiError::Validation(_))
        ));
    }
}
