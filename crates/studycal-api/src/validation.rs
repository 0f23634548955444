use chrono::NaiveDate;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// Longest span a single calendar listing may cover
pub const MAX_LISTING_DAYS: i64 = 366;

/// Longest free-text skip reason
pub const MAX_SKIP_REASON_LEN: usize = 500;

/// Run the derived `validator` rules of a request body
pub fn validate_request<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::Validation(describe(&e)))
}

/// Flatten validator output into `field: message` pairs
fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        errors.to_string()
    } else {
        parts.join(", ")
    }
}

/// Validate a duration reported by the learner
///
/// # Examples
/// ```
/// use studycal_api::validation::validate_hours;
///
/// assert!(validate_hours("completed_hours", 1.5).is_ok());
/// assert!(validate_hours("completed_hours", -1.0).is_err());
/// ```
pub fn validate_hours(field: &str, hours: f64) -> Result<(), ApiError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(ApiError::Validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    if hours > 24.0 {
        return Err(ApiError::Validation(format!(
            "{field} cannot exceed 24 hours"
        )));
    }
    Ok(())
}

/// Validate the optional reason given when skipping a session
pub fn validate_skip_reason(reason: &str) -> Result<(), ApiError> {
    if reason.chars().count() > MAX_SKIP_REASON_LEN {
        return Err(ApiError::Validation(format!(
            "Skip reason must be at most {MAX_SKIP_REASON_LEN} characters long"
        )));
    }
    if reason.chars().any(|c| c.is_control() && c != '\n') {
        return Err(ApiError::Validation(
            "Skip reason contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate the `[from, to]` range of a calendar listing
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
    if to < from {
        return Err(ApiError::Validation(format!(
            "'to' ({to}) must not be before 'from' ({from})"
        )));
    }
    if (to - from).num_days() > MAX_LISTING_DAYS {
        return Err(ApiError::Validation(format!(
            "A listing may cover at most {MAX_LISTING_DAYS} days"
        )));
    }
    Ok(())
}
