//! SM-2 scheduling for completion-triggered reviews.

use std::{cmp::Reverse, collections::HashMap};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    capacity::{DailyBudget, DateWindow, WeeklyCapacity},
    error::PlannerError,
    ledger::PlanLedger,
    rotation::{SLOT_MINUTES, SessionLimits},
    session::{SessionOrigin, SessionRecord, SessionStatus, SessionTrim},
    topic::UnitKey,
};

/// Lower bound on the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Per-(plan, topic) learning statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub ease_factor: f64,
    pub interval_days: u32,
    /// Running mean of `quality / 5` over all reviews
    pub success_rate: f64,
    pub total_reviews: u32,
    pub hours_spent: f64,
    pub last_reviewed_at: Option<NaiveDate>,
}

impl Default for TopicProgress {
    fn default() -> Self {
        Self {
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            success_rate: 1.0,
            total_reviews: 0,
            hours_spent: 0.0,
            last_reviewed_at: None,
        }
    }
}

/// Learner-reported recall quality on the 0..=5 SM-2 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, PlannerError> {
        if value > Self::MAX {
            return Err(PlannerError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(3)
    }
}

/// Compute the next ease factor.
///
/// `EF' = max(1.3, EF + 0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))`
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    let miss = f64::from(Quality::MAX - quality.value());
    let delta = 0.1 - miss * (0.08 + miss * 0.02);
    (ease_factor + delta).max(MIN_EASE_FACTOR)
}

/// Compute the next review interval in days.
///
/// # Arguments
///
/// * `previous_interval` - Interval used after the previous review
/// * `total_reviews` - Reviews recorded before this one
/// * `ease_factor` - The already-updated ease factor
/// * `quality` - Recall quality of this review
///
/// # Algorithm
///
/// * Quality below 3: 1 day
/// * First review: 1 day
/// * Second review: 6 days
/// * Afterwards: `round(previous_interval * ease_factor)`, at least 1 day
pub fn next_interval(
    previous_interval: u32,
    total_reviews: u32,
    ease_factor: f64,
    quality: Quality,
) -> u32 {
    if quality.value() < 3 {
        return 1;
    }
    match total_reviews {
        0 => 1,
        1 => 6,
        _ => ((f64::from(previous_interval) * ease_factor).round() as u32).max(1),
    }
}

/// Stored statistics of a plan, by topic.
pub type ProgressByTopic = HashMap<Uuid, TopicProgress>;

impl TopicProgress {
    /// Date the next review is due, `last_reviewed_at + interval_days`.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.last_reviewed_at?
            .checked_add_days(Days::new(u64::from(self.interval_days)))
    }

    /// Fold one completed session into the statistics.
    pub fn record_review(&self, quality: Quality, hours_spent: f64, today: NaiveDate) -> Self {
        let ease_factor = next_ease_factor(self.ease_factor, quality);
        let interval_days = next_interval(self.interval_days, self.total_reviews, ease_factor, quality);
        let reviews = f64::from(self.total_reviews);
        let success_rate =
            (self.success_rate * reviews + f64::from(quality.value()) / 5.0) / (reviews + 1.0);

        Self {
            ease_factor,
            interval_days,
            success_rate,
            total_reviews: self.total_reviews + 1,
            hours_spent: self.hours_spent + hours_spent.max(0.0),
            last_reviewed_at: Some(today),
        }
    }
}

/// `min(today + interval, exam - 1)`, or `None` when that is not after today.
pub fn review_target_date(today: NaiveDate, interval_days: u32, exam: NaiveDate) -> Option<NaiveDate> {
    let last = exam.checked_sub_days(Days::new(1))?;
    let target = today
        .checked_add_days(Days::new(u64::from(interval_days)))
        .map_or(last, |date| date.min(last));
    (target > today).then_some(target)
}

/// First day from `target` forward to `last`, then backward down to `lowest`, that `fits`.
fn nearest_day<F>(target: NaiveDate, lowest: NaiveDate, last: NaiveDate, fits: F) -> Option<NaiveDate>
where
    F: Fn(&NaiveDate) -> bool,
{
    let forward = target.iter_days().take_while(|d| *d <= last);
    let backward =
        std::iter::successors(target.pred_opt(), NaiveDate::pred_opt).take_while(|d| *d >= lowest);

    forward.chain(backward).find(fits)
}

/// Find a date for a review of `minutes` near `target`.
///
/// Searches forward from `target` to the day before the exam, then backward to
/// the day after `today`. A date qualifies when it has enough spare capacity and
/// holds no pending review of the same unit.
pub fn place_review(
    ledger: &PlanLedger,
    capacity: &WeeklyCapacity,
    key: UnitKey,
    target: NaiveDate,
    today: NaiveDate,
    exam: NaiveDate,
    minutes: u32,
) -> Option<NaiveDate> {
    let last = exam.checked_sub_days(Days::new(1))?;
    let lowest = today.succ_opt()?;
    nearest_day(target, lowest, last, |date| {
        ledger.spare_minutes(capacity, *date) >= minutes && !ledger.has_pending_review(*date, key)
    })
}

/// Same search as [`place_review`], inside a scheduling window and against its budget.
pub fn place_in_window(
    budget: &DailyBudget,
    ledger: &PlanLedger,
    key: UnitKey,
    target: NaiveDate,
    window: DateWindow,
    minutes: u32,
) -> Option<NaiveDate> {
    if window.is_empty() {
        return None;
    }
    let target = target.clamp(window.start, window.end);
    nearest_day(target, window.start, window.end, |date| {
        budget.remaining(*date) >= minutes && !ledger.has_pending_review(*date, key)
    })
}

/// Pick a pending rotation session on `date` that can give up `shortfall` minutes.
///
/// The cut is rounded up to whole slots and must leave at least the minimum
/// session length. Sessions of the same unit go first, then the longest.
pub fn trim_for_review(
    sessions: &[SessionRecord],
    date: NaiveDate,
    key: UnitKey,
    shortfall: u32,
    limits: SessionLimits,
) -> Option<SessionTrim> {
    let cut = shortfall.div_ceil(SLOT_MINUTES) * SLOT_MINUTES;
    sessions
        .iter()
        .filter(|s| {
            s.date == date
                && s.status == SessionStatus::Pending
                && s.origin == SessionOrigin::Rotation
                && s.minutes >= limits.min_minutes() + cut
        })
        .min_by_key(|s| (s.topic.key() != key, Reverse(s.minutes), s.id))
        .map(|s| SessionTrim {
            session_id: s.id,
            minutes: s.minutes - cut,
        })
}
