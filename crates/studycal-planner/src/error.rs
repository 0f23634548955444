use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Suggested ways out of an infeasible plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Remediation {
    /// Additional weekly hours that would cover the deficit before the current exam date
    pub extra_hours_per_week: f64,
    /// First exam date at which the current weekly capacity covers the workload
    pub suggested_exam_date: Option<NaiveDate>,
    /// Human-readable summary of the two options
    pub hint: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error(
        "Plan is infeasible: {required_hours:.1}h required but only {available_hours:.1}h available ({deficit_hours:.1}h short); {}",
        remediation.hint
    )]
    InfeasiblePlan {
        required_hours: f64,
        available_hours: f64,
        deficit_hours: f64,
        remediation: Remediation,
    },
    #[error("No study capacity between {start} and {end}")]
    MissingCapacity { start: NaiveDate, end: NaiveDate },
    #[error("Topic {0} not found in catalog")]
    TopicNotFound(Uuid),
    #[error("Exam date {exam} must be after start date {start}")]
    InvalidDateRange { start: NaiveDate, exam: NaiveDate },
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),
    #[error("Invalid topic {id}: {reason}")]
    InvalidTopic { id: Uuid, reason: String },
    #[error("Quality rating must be between 0 and 5, got {0}")]
    InvalidQuality(u8),
    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl PlannerError {
    /// Whether the caller can fix the request and try again without touching stored data.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InfeasiblePlan { .. } | Self::MissingCapacity { .. } | Self::TopicNotFound(_)
        )
    }

    /// Deficit in hours for infeasible plans.
    pub const fn deficit_hours(&self) -> Option<f64> {
        match self {
            Self::InfeasiblePlan { deficit_hours, .. } => Some(*deficit_hours),
            _ => None,
        }
    }
}
