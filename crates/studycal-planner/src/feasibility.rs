//! Feasibility validator.
//!
//! A pure check run before anything is persisted: the total study, review and
//! test hours required by the topic set must fit into the capacity available
//! between the start date and the exam date (both inclusive).

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    capacity::{DateWindow, WeeklyCapacity},
    error::{PlannerError, Remediation},
    topic::Topic,
};

/// Upper bound on how far past the exam date a remediation suggestion searches.
const MAX_EXTENSION_DAYS: u64 = 3 * 365;

/// Per-topic workload constants on top of the base study hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRates {
    pub hours_per_review: f64,
    pub hours_per_test: f64,
    pub test_count: u32,
}

impl Default for WorkloadRates {
    fn default() -> Self {
        Self {
            hours_per_review: 0.75,
            hours_per_test: 2.0,
            test_count: 3,
        }
    }
}

impl WorkloadRates {
    /// `base + reviews(complexity) * hours_per_review + tests * hours_per_test`
    pub fn required_hours(&self, topic: &Topic) -> f64 {
        topic.estimated_hours + self.consolidation_hours(topic)
    }

    /// The review and test part of a topic's requirement.
    pub fn consolidation_hours(&self, topic: &Topic) -> f64 {
        f64::from(topic.complexity.review_count()) * self.hours_per_review
            + f64::from(self.test_count) * self.hours_per_test
    }
}

/// Outcome of an accepted feasibility check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeasibilityReport {
    pub required_hours: f64,
    pub available_hours: f64,
    /// `available - required`; never negative for an accepted plan
    pub margin_hours: f64,
}

/// Compare required against available hours over `[start, exam]`.
///
/// `topics` are paired with hours already completed on them, which are
/// subtracted from their requirement (zero for a fresh plan).
pub fn check<'a, I>(
    start: NaiveDate,
    exam: NaiveDate,
    capacity: &WeeklyCapacity,
    topics: I,
    rates: &WorkloadRates,
) -> Result<FeasibilityReport, PlannerError>
where
    I: IntoIterator<Item = (&'a Topic, f64)>,
{
    if exam < start {
        return Err(PlannerError::InvalidDateRange { start, exam });
    }

    let window = DateWindow::new(start, exam);
    let available_hours = capacity.available_hours(window);
    let required_hours: f64 = topics
        .into_iter()
        .map(|(topic, spent)| (rates.required_hours(topic) - spent).max(0.0))
        .sum();

    // Nothing left to schedule fits any window, even one without capacity
    if required_hours <= 0.0 {
        return Ok(FeasibilityReport {
            required_hours: 0.0,
            available_hours,
            margin_hours: available_hours,
        });
    }
    if available_hours <= 0.0 {
        return Err(PlannerError::MissingCapacity {
            start,
            end: exam,
        });
    }

    if required_hours > available_hours {
        let deficit_hours = required_hours - available_hours;
        return Err(PlannerError::InfeasiblePlan {
            required_hours,
            available_hours,
            deficit_hours,
            remediation: remediation(window, capacity, deficit_hours),
        });
    }

    Ok(FeasibilityReport {
        required_hours,
        available_hours,
        margin_hours: available_hours - required_hours,
    })
}

fn remediation(window: DateWindow, capacity: &WeeklyCapacity, deficit_hours: f64) -> Remediation {
    let weeks = (window.len_days() as f64 / 7.0).max(1.0 / 7.0);
    // Round up to the next half hour
    let extra_hours_per_week = (deficit_hours / weeks * 2.0).ceil() / 2.0;

    let suggested_exam_date = extended_exam_date(window.end, capacity, deficit_hours);

    let hint = match suggested_exam_date {
        Some(date) => format!(
            "add {extra_hours_per_week:.1} hours per week or move the exam date to {date}"
        ),
        None => format!("add {extra_hours_per_week:.1} hours per week"),
    };

    Remediation {
        extra_hours_per_week,
        suggested_exam_date,
        hint,
    }
}

/// Walk past the exam date until the extra capacity covers the deficit.
fn extended_exam_date(
    exam: NaiveDate,
    capacity: &WeeklyCapacity,
    deficit_hours: f64,
) -> Option<NaiveDate> {
    if capacity.is_empty() {
        return None;
    }

    let mut covered = 0.0;
    for offset in 1..=MAX_EXTENSION_DAYS {
        let date = exam.checked_add_days(Days::new(offset))?;
        covered += capacity.hours_on(date.weekday());
        if covered >= deficit_hours {
            return Some(date);
        }
    }
    None
}
