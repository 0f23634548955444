use super::{Cadence, Coverage, PlannedSession, RotationContext, RotationStrategy, split_day};
use crate::session::SessionCounter;

/// Length of one phase block in days.
pub const PHASE_BLOCK_DAYS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    New,
    Review,
    Test,
    Flash,
}

/// Base share of daily time per phase, in percent.
const PHASE_WEIGHTS: [(Phase, f64); 4] = [
    (Phase::New, 55.0),
    (Phase::Review, 28.0),
    (Phase::Test, 10.0),
    (Phase::Flash, 7.0),
];

impl Phase {
    /// Phase of a unit `age` blocks after its introduction block.
    const fn for_age(age: usize) -> Option<Self> {
        match age {
            0 => Some(Self::New),
            1 => Some(Self::Review),
            2 => None,
            3 => Some(Self::Test),
            _ => Some(Self::Flash),
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::New => 0,
            Self::Review => 1,
            Self::Test => 2,
            Self::Flash => 3,
        }
    }
}

/// Month-phased rotation for long horizons.
///
/// The window is cut into 30-day blocks. Units are introduced evenly across all
/// blocks but the last, then move through review, test and flash phases as
/// they age. Each day is shared between the non-empty phases by weight; the
/// share of a phase too small for a session carries over to the next day.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhasedRotation;

impl RotationStrategy for PhasedRotation {
    fn name(&self) -> &'static str {
        "phased"
    }

    fn rotate(
        &self,
        ctx: &RotationContext<'_>,
        counter: &mut SessionCounter,
    ) -> Vec<PlannedSession> {
        let mut planned = Vec::new();
        let unit_count = ctx.units.len();
        if unit_count == 0 || ctx.window.is_empty() {
            return planned;
        }

        let total_days = ctx.day_offset(ctx.window.end) + 1;
        let months = total_days.div_ceil(PHASE_BLOCK_DAYS);
        let intro_months = if months > 1 { months - 1 } else { 1 };
        let intro: Vec<usize> = (0..unit_count)
            .map(|i| i * intro_months / unit_count)
            .collect();

        let cadence = Cadence::for_weekly_hours(ctx.weekly_hours);
        let mut coverage = Coverage::new(ctx.units);
        let mut credit = [0.0_f64; 4];
        let mut current_month = None;

        for date in ctx.window.days() {
            let budget = ctx.budget.remaining(date);
            if budget < ctx.limits.min_minutes() {
                continue;
            }

            let day = ctx.day_offset(date);
            let month = day / PHASE_BLOCK_DAYS;
            if current_month != Some(month) {
                current_month = Some(month);
                credit = [0.0; 4];
            }

            let phases = phase_members(ctx, &intro, &coverage, month);
            let total_weight: f64 = phases.iter().map(|(phase, _)| weight_of(*phase)).sum();
            let mut remaining = budget;

            for (phase, members) in &phases {
                let share = weight_of(*phase) / total_weight;
                let slots = ((cadence.max_active as f64 * share).round() as usize)
                    .clamp(1, members.len());
                let cap = f64::from(ctx.limits.max_minutes()) * slots as f64;

                let slot = phase.slot();
                credit[slot] = (credit[slot] + f64::from(budget) * share).min(cap);
                let grant = (credit[slot].floor() as u32).min(remaining);
                if grant < ctx.limits.min_minutes() {
                    continue;
                }

                let start = day % members.len();
                let chosen: Vec<(usize, f64)> = (0..slots)
                    .map(|k| members[(start + k) % members.len()])
                    .map(|i| (i, ctx.units[i].multiplier))
                    .collect();

                for (unit, minutes) in split_day(&chosen, grant, ctx.limits) {
                    let (stage, role) = counter.next(ctx.units[unit].key());
                    coverage.add(unit, minutes);
                    credit[slot] -= f64::from(minutes);
                    remaining -= minutes;
                    planned.push(PlannedSession {
                        unit,
                        date,
                        minutes,
                        role,
                        stage,
                    });
                }
            }
        }

        tracing::debug!(
            sessions = planned.len(),
            months,
            intro_months,
            "phased rotation finished"
        );
        planned
    }
}

fn weight_of(phase: Phase) -> f64 {
    PHASE_WEIGHTS
        .iter()
        .find(|(p, _)| *p == phase)
        .map_or(0.0, |(_, w)| *w)
}

/// Non-empty phases for `month` with their member units, in weight order.
fn phase_members(
    ctx: &RotationContext<'_>,
    intro: &[usize],
    coverage: &Coverage,
    month: usize,
) -> Vec<(Phase, Vec<usize>)> {
    let mut members: [Vec<usize>; 4] = Default::default();

    for (index, unit) in ctx.units.iter().enumerate() {
        let introduced = intro[index];
        let phase = month.checked_sub(introduced).and_then(Phase::for_age);

        match phase {
            Some(Phase::New) if coverage.is_saturated(index) => {}
            Some(phase) => members[phase.slot()].push(index),
            None if unit.pinned => members[Phase::Review.slot()].push(index),
            None => {}
        }
    }

    let mut phases: Vec<(Phase, Vec<usize>)> = PHASE_WEIGHTS
        .iter()
        .map(|(phase, _)| *phase)
        .zip(members)
        .filter(|(_, units)| !units.is_empty())
        .collect();

    if phases.is_empty() {
        let introduced: Vec<usize> = (0..ctx.units.len())
            .filter(|&i| intro[i] <= month)
            .collect();
        if !introduced.is_empty() {
            phases.push((Phase::Review, introduced));
        }
    }

    phases
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::{
        capacity::{DailyBudget, DateWindow, tests::weekdays},
        rotation::{SessionLimits, tests::unit},
        session::SessionRole,
        topic::StudyUnit,
    };

    fn run(units: &[StudyUnit], days: u64, hours: f64) -> (DateWindow, Vec<PlannedSession>) {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let window = DateWindow::new(start, start + Days::new(days - 1));
        let capacity = weekdays(hours);
        let budget = DailyBudget::new(&capacity, window, &HashMap::new());
        let ctx = RotationContext {
            units,
            window,
            anchor: start,
            budget: &budget,
            weekly_hours: capacity.weekly_hours(),
            limits: SessionLimits::default(),
        };
        (window, PhasedRotation.rotate(&ctx, &mut SessionCounter::new()))
    }

    #[test]
    fn test_first_block_only_introduces_first_units() {
        let units: Vec<_> = (0..8).map(|_| unit("a", 1200)).collect();
        // 180 days: six blocks, units introduced across the first five
        let (window, planned) = run(&units, 180, 3.0);

        let first_block: HashSet<usize> = planned
            .iter()
            .filter(|s| s.date < window.start + Days::new(30))
            .map(|s| s.unit)
            .collect();
        // i * 5 / 8 == 0 for i in 0..=1
        assert_eq!(first_block, HashSet::from([0, 1]));
    }

    #[test]
    fn test_capacity_and_role_sequence_hold() {
        let units: Vec<_> = (0..6).map(|_| unit("a", 900)).collect();
        let (_, planned) = run(&units, 150, 2.0);

        let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
        for session in &planned {
            *per_day.entry(session.date).or_insert(0) += session.minutes;
        }
        assert!(per_day.values().all(|&m| m <= 120));

        for index in 0..units.len() {
            let roles: Vec<_> = planned
                .iter()
                .filter(|s| s.unit == index)
                .map(|s| s.role)
                .collect();
            assert!(!roles.is_empty(), "unit {index} never scheduled");
            assert_eq!(roles[0], SessionRole::Study);
            for (n, role) in roles.iter().enumerate() {
                assert_eq!(*role, SessionRole::for_counter(n as u32 + 1));
            }
        }
    }

    #[test]
    fn test_later_blocks_keep_earlier_units_in_review() {
        let units: Vec<_> = (0..4).map(|_| unit("a", 600)).collect();
        let (window, planned) = run(&units, 150, 3.0);

        // Unit 0 is introduced in block 0 and reviewed in block 1
        let second_block = window.start + Days::new(30)..window.start + Days::new(60);
        assert!(
            planned
                .iter()
                .any(|s| s.unit == 0 && second_block.contains(&s.date))
        );
    }

    #[test]
    fn test_short_window_is_a_single_block() {
        let units: Vec<_> = (0..3).map(|_| unit("a", 300)).collect();
        let (_, planned) = run(&units, 20, 2.0);
        let scheduled: HashSet<usize> = planned.iter().map(|s| s.unit).collect();
        assert_eq!(scheduled.len(), 3);
    }
}
