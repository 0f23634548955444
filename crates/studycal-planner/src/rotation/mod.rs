//! Rotation scheduling.
//!
//! A [`RotationStrategy`] turns the study units and the per-day budget of a
//! window into planned `(unit, date, role, minutes)` entries. Roles come from
//! the [`SessionCounter`] threaded through the call, never from the date.

mod cycle;
mod phased;

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use cycle::CycleRotation;
pub use phased::{PHASE_BLOCK_DAYS, PhasedRotation};

use crate::{
    capacity::{DailyBudget, DateWindow},
    error::PlannerError,
    session::{SessionCounter, SessionRole},
    topic::{StudyUnit, hours_to_minutes},
};

/// Session lengths are multiples of this many minutes.
pub const SLOT_MINUTES: u32 = 15;

/// Windows at least this long use the phased strategy under [`StrategyKind::Auto`].
pub const PHASED_THRESHOLD_DAYS: i64 = 120;

/// Bounds on a single session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    min_minutes: u32,
    max_minutes: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            min_minutes: 30,
            max_minutes: 120,
        }
    }
}

impl SessionLimits {
    /// Build from hours; the minimum rounds up and the maximum down to whole slots.
    pub fn from_hours(min_hours: f64, max_hours: f64) -> Result<Self, PlannerError> {
        let min = hours_to_minutes(min_hours).div_ceil(SLOT_MINUTES) * SLOT_MINUTES;
        let max = hours_to_minutes(max_hours) / SLOT_MINUTES * SLOT_MINUTES;

        if min == 0 {
            return Err(PlannerError::InvalidCapacity(
                "minimum session time must be positive".to_string(),
            ));
        }
        if max < min {
            return Err(PlannerError::InvalidCapacity(format!(
                "maximum session time ({max_hours}h) is below the minimum ({min_hours}h)"
            )));
        }

        Ok(Self {
            min_minutes: min,
            max_minutes: max,
        })
    }

    pub const fn min_minutes(&self) -> u32 {
        self.min_minutes
    }

    pub const fn max_minutes(&self) -> u32 {
        self.max_minutes
    }

    /// Round down to a whole slot.
    pub const fn floor(&self, minutes: u32) -> u32 {
        minutes - minutes % SLOT_MINUTES
    }

    /// Clamp a raw duration into `[min, max]` on slot boundaries.
    pub fn fit(&self, raw_minutes: f64) -> u32 {
        let clamped = raw_minutes
            .round()
            .clamp(f64::from(self.min_minutes), f64::from(self.max_minutes));
        self.floor(clamped as u32).max(self.min_minutes)
    }
}

/// Rotation-cycle length and active-set size derived from weekly hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub cycle_days: usize,
    pub max_active: usize,
}

impl Cadence {
    pub fn for_weekly_hours(weekly_hours: f64) -> Self {
        if weekly_hours < 5.0 {
            Self {
                cycle_days: 3,
                max_active: 2,
            }
        } else if weekly_hours <= 15.0 {
            Self {
                cycle_days: 5,
                max_active: 3,
            }
        } else {
            Self {
                cycle_days: 7,
                max_active: 4,
            }
        }
    }
}

/// One rotation decision, before capacity clipping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSession {
    /// Index into the units slice the strategy was given
    pub unit: usize,
    pub date: NaiveDate,
    pub minutes: u32,
    pub role: SessionRole,
    pub stage: u32,
}

/// Inputs shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct RotationContext<'a> {
    pub units: &'a [StudyUnit],
    pub window: DateWindow,
    /// Plan start date; day offsets are measured from here so partial windows line up
    pub anchor: NaiveDate,
    pub budget: &'a DailyBudget,
    pub weekly_hours: f64,
    pub limits: SessionLimits,
}

impl RotationContext<'_> {
    pub(crate) fn day_offset(&self, date: NaiveDate) -> usize {
        (date - self.anchor).num_days().max(0) as usize
    }
}

pub trait RotationStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce planned sessions for every day of the context window.
    ///
    /// The sum of planned minutes on a day never exceeds that day's budget.
    fn rotate(&self, ctx: &RotationContext<'_>, counter: &mut SessionCounter)
    -> Vec<PlannedSession>;
}

/// Configured choice of rotation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Cycle,
    Phased,
    #[default]
    Auto,
}

impl StrategyKind {
    pub fn build(self, window_days: i64) -> Box<dyn RotationStrategy> {
        match self {
            Self::Cycle => Box::new(CycleRotation),
            Self::Phased => Box::new(PhasedRotation),
            Self::Auto if window_days >= PHASED_THRESHOLD_DAYS => Box::new(PhasedRotation),
            Self::Auto => Box::new(CycleRotation),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cycle" => Ok(Self::Cycle),
            "phased" => Ok(Self::Phased),
            "auto" => Ok(Self::Auto),
            other => Err(PlannerError::UnknownVariant {
                kind: "rotation strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// Minutes allocated per unit against its current target.
#[derive(Debug, Clone)]
pub(crate) struct Coverage {
    allocated: Vec<u32>,
    targets: Vec<u32>,
    lap: u32,
}

impl Coverage {
    pub(crate) fn new(units: &[StudyUnit]) -> Self {
        Self {
            allocated: vec![0; units.len()],
            targets: units.iter().map(|u| u.target_minutes).collect(),
            lap: 0,
        }
    }

    pub(crate) fn is_saturated(&self, unit: usize) -> bool {
        self.allocated[unit] >= self.targets[unit]
    }

    pub(crate) fn add(&mut self, unit: usize, minutes: u32) {
        self.allocated[unit] += minutes;
    }

    /// Once every unit has met its target, start a consolidation lap.
    pub(crate) fn start_lap_if_done(&mut self, units: &[StudyUnit]) {
        if units.is_empty() || !(0..units.len()).all(|i| self.is_saturated(i)) {
            return;
        }
        self.lap += 1;
        self.allocated.iter_mut().for_each(|a| *a = 0);
        for (target, unit) in self.targets.iter_mut().zip(units) {
            *target = unit.consolidation_minutes.max(1);
        }
        tracing::trace!(lap = self.lap, "every unit covered, starting consolidation lap");
    }

    pub(crate) const fn lap(&self) -> u32 {
        self.lap
    }
}

/// Split `budget` minutes across `entries` in order, giving earlier entries larger slices.
///
/// Each entry's share is proportional to its weight times its positional weight
/// (`n, n-1, …, 1`), fitted into the session limits. Entries that no longer fit
/// get nothing. The returned minutes never sum past `budget`.
pub(crate) fn split_day(
    entries: &[(usize, f64)],
    budget: u32,
    limits: SessionLimits,
) -> Vec<(usize, u32)> {
    let n = entries.len();
    let denominator: f64 = entries
        .iter()
        .enumerate()
        .map(|(pos, (_, weight))| weight * (n - pos) as f64)
        .sum();
    if n == 0 || denominator <= 0.0 {
        return Vec::new();
    }

    let mut remaining = budget;
    let mut slices = Vec::with_capacity(n);

    for (pos, &(unit, weight)) in entries.iter().enumerate() {
        if remaining < limits.min_minutes() {
            break;
        }
        let raw = f64::from(budget) * weight * (n - pos) as f64 / denominator;
        let minutes = limits.fit(raw).min(limits.floor(remaining));
        if minutes < limits.min_minutes() {
            continue;
        }
        remaining -= minutes;
        slices.push((unit, minutes));
    }

    slices
}
