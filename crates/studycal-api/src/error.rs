use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use studycal_planner::{PlannerError, Remediation};
use thiserror::Error;

/// SQLSTATE codes raised when another transaction holds or raced for the same rows:
/// `lock_not_available`, `serialization_failure` and `deadlock_detected`.
const CONTENTION_SQLSTATES: [&str; 3] = ["55P03", "40001", "40P01"];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("The plan was modified by another request, please retry")]
    ConcurrentModification,
    #[error(transparent)]
    Planner(#[from] PlannerError),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        let contended = err
            .as_database_error()
            .and_then(|e| e.code())
            .is_some_and(|code| CONTENTION_SQLSTATES.contains(&code.as_ref()));

        if contended {
            Self::ConcurrentModification
        } else {
            Self::Database(err)
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::ConcurrentModification => StatusCode::CONFLICT,
            Self::Planner(e) if e.is_rejection() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Planner(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Body of a 422 response: the plan was refused before anything was written.
#[derive(Debug, Serialize)]
pub struct Rejection {
    pub success: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deficit_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

impl From<&PlannerError> for Rejection {
    fn from(err: &PlannerError) -> Self {
        let mut rejection = Self {
            success: false,
            reason: err.to_string(),
            deficit_hours: None,
            required_hours: None,
            available_hours: None,
            remediation: None,
        };
        if let PlannerError::InfeasiblePlan {
            required_hours,
            available_hours,
            deficit_hours,
            remediation,
        } = err
        {
            rejection.deficit_hours = Some(*deficit_hours);
            rejection.required_hours = Some(*required_hours);
            rejection.available_hours = Some(*available_hours);
            rejection.remediation = Some(remediation.clone());
        }
        rejection
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            Self::Planner(err) if err.is_rejection() => {
                tracing::info!(reason = %err, "plan rejected");
                (status, Json(Rejection::from(&err))).into_response()
            }
            Self::Database(err) => {
                tracing::error!("Database error: {err}");
                (
                    status,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_status_codes() {
        let infeasible = PlannerError::InfeasiblePlan {
            required_hours: 100.0,
            available_hours: 80.0,
            deficit_hours: 20.0,
            remediation: Remediation {
                extra_hours_per_week: 2.5,
                suggested_exam_date: Some(date(30)),
                hint: "study more".to_string(),
            },
        };
        assert_eq!(
            ApiError::from(infeasible).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(PlannerError::TopicNotFound(Uuid::new_v4())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(PlannerError::InvalidQuality(9)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PlannerError::InvalidDateRange {
                start: date(6),
                exam: date(5)
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ConcurrentModification.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_carries_deficit() {
        let err = PlannerError::InfeasiblePlan {
            required_hours: 100.0,
            available_hours: 80.0,
            deficit_hours: 20.0,
            remediation: Remediation {
                extra_hours_per_week: 2.5,
                suggested_exam_date: None,
                hint: "study more".to_string(),
            },
        };
        let body = serde_json::to_value(Rejection::from(&err)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["deficit_hours"], 20.0);
        assert_eq!(body["remediation"]["extra_hours_per_week"], 2.5);

        let missing = PlannerError::MissingCapacity {
            start: date(6),
            end: date(20),
        };
        let body = serde_json::to_value(Rejection::from(&missing)).unwrap();
        assert!(body.get("deficit_hours").is_none());
        assert!(body["reason"].as_str().unwrap().contains("No study capacity"));
    }
}
