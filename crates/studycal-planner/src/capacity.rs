//! Weekly capacity model and the per-date budgets derived from it.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{error::PlannerError, topic::hours_to_minutes};

const MAX_HOURS_PER_DAY: f64 = 24.0;

/// Available study hours for each weekday; zero marks a rest day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeekdayHours", into = "WeekdayHours")]
pub struct WeeklyCapacity {
    /// Monday first
    hours: [f64; 7],
}

impl WeeklyCapacity {
    pub fn new(hours: [f64; 7]) -> Result<Self, PlannerError> {
        for (index, value) in hours.iter().enumerate() {
            if !value.is_finite() || *value < 0.0 || *value > MAX_HOURS_PER_DAY {
                return Err(PlannerError::InvalidCapacity(format!(
                    "{:?} must be between 0 and 24 hours, got {value}",
                    weekday_from_index(index)
                )));
            }
        }
        Ok(Self { hours })
    }

    /// Build from `(weekday, hours)` pairs; missing weekdays are rest days.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, PlannerError>
    where
        I: IntoIterator<Item = (Weekday, f64)>,
    {
        let mut hours = [0.0; 7];
        for (weekday, value) in pairs {
            hours[weekday.num_days_from_monday() as usize] = value;
        }
        Self::new(hours)
    }

    pub fn hours_on(&self, weekday: Weekday) -> f64 {
        self.hours[weekday.num_days_from_monday() as usize]
    }

    pub fn minutes_on(&self, date: NaiveDate) -> u32 {
        hours_to_minutes(self.hours_on(date.weekday()))
    }

    pub fn weekly_hours(&self) -> f64 {
        self.hours.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.iter().all(|h| *h == 0.0)
    }

    /// Total hours over an inclusive date range.
    pub fn available_hours(&self, window: DateWindow) -> f64 {
        window.days().map(|d| self.hours_on(d.weekday())).sum()
    }

    /// Total minutes over an inclusive date range.
    pub fn available_minutes(&self, window: DateWindow) -> u64 {
        window.days().map(|d| u64::from(self.minutes_on(d))).sum()
    }

    /// `(weekday, hours)` pairs, Monday first.
    pub fn pairs(&self) -> impl Iterator<Item = (Weekday, f64)> + '_ {
        self.hours
            .iter()
            .enumerate()
            .map(|(index, hours)| (weekday_from_index(index), *hours))
    }
}

const fn weekday_from_index(index: usize) -> Weekday {
    match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// Wire shape of [`WeeklyCapacity`]: one field per weekday.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekdayHours {
    #[serde(alias = "mon")]
    pub monday: f64,
    #[serde(alias = "tue")]
    pub tuesday: f64,
    #[serde(alias = "wed")]
    pub wednesday: f64,
    #[serde(alias = "thu")]
    pub thursday: f64,
    #[serde(alias = "fri")]
    pub friday: f64,
    #[serde(alias = "sat")]
    pub saturday: f64,
    #[serde(alias = "sun")]
    pub sunday: f64,
}

impl TryFrom<WeekdayHours> for WeeklyCapacity {
    type Error = PlannerError;

    fn try_from(w: WeekdayHours) -> Result<Self, Self::Error> {
        Self::new([
            w.monday,
            w.tuesday,
            w.wednesday,
            w.thursday,
            w.friday,
            w.saturday,
            w.sunday,
        ])
    }
}

impl From<WeeklyCapacity> for WeekdayHours {
    fn from(c: WeeklyCapacity) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = c.hours;
        Self {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn len_days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Remaining minutes per date inside a scheduling window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyBudget {
    remaining: BTreeMap<NaiveDate, u32>,
}

impl DailyBudget {
    /// Capacity of each date in `window` minus what is already booked on it.
    pub fn new(
        capacity: &WeeklyCapacity,
        window: DateWindow,
        booked: &HashMap<NaiveDate, u32>,
    ) -> Self {
        let remaining = window
            .days()
            .map(|date| {
                let taken = booked.get(&date).copied().unwrap_or(0);
                (date, capacity.minutes_on(date).saturating_sub(taken))
            })
            .collect();
        Self { remaining }
    }

    pub fn remaining(&self, date: NaiveDate) -> u32 {
        self.remaining.get(&date).copied().unwrap_or(0)
    }

    /// Book `minutes` on `date`.
    ///
    /// # Panics
    ///
    /// Panics when more than the remaining capacity is booked; callers must clip first.
    pub fn consume(&mut self, date: NaiveDate, minutes: u32) {
        let remaining = self.remaining.entry(date).or_insert(0);
        assert!(
            minutes <= *remaining,
            "booking {minutes} minutes on {date} exceeds remaining capacity of {remaining}"
        );
        *remaining -= minutes;
    }

    pub fn total(&self) -> u64 {
        self.remaining.values().map(|m| u64::from(*m)).sum()
    }
}
