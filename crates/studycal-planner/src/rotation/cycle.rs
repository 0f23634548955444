use super::{Cadence, Coverage, PlannedSession, RotationContext, RotationStrategy, split_day};
use crate::{session::SessionCounter, topic::StudyUnit};

/// Cycle-based rotation over catalog blocks.
///
/// The window is cut into cycles of [`Cadence::cycle_days`] days. Each cycle
/// activates one block; inside it a sliding window of up to
/// [`Cadence::max_active`] unsaturated units is studied, shifted every time the
/// rotation comes back to the block. Pinned units come first but never fill
/// the whole active set; when there are more of them than fit, they take turns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleRotation;

impl RotationStrategy for CycleRotation {
    fn name(&self) -> &'static str {
        "cycle"
    }

    fn rotate(
        &self,
        ctx: &RotationContext<'_>,
        counter: &mut SessionCounter,
    ) -> Vec<PlannedSession> {
        let mut planned = Vec::new();
        if ctx.units.is_empty() {
            return planned;
        }

        let cadence = Cadence::for_weekly_hours(ctx.weekly_hours);
        let blocks = group_blocks(ctx.units);
        let pinned: Vec<usize> = (0..ctx.units.len())
            .filter(|&i| ctx.units[i].pinned)
            .collect();
        let mut coverage = Coverage::new(ctx.units);

        for date in ctx.window.days() {
            let budget = ctx.budget.remaining(date);
            if budget < ctx.limits.min_minutes() {
                continue;
            }
            coverage.start_lap_if_done(ctx.units);

            let day = ctx.day_offset(date);
            let cycle = day / cadence.cycle_days;
            let mut active = active_set(&blocks, &pinned, &coverage, cycle, cadence.max_active);
            if active.is_empty() {
                continue;
            }
            let shift = day % active.len();
            active.rotate_left(shift);

            let weighted: Vec<(usize, f64)> = active
                .iter()
                .map(|&i| (i, ctx.units[i].multiplier))
                .collect();

            for (unit, minutes) in split_day(&weighted, budget, ctx.limits) {
                let (stage, role) = counter.next(ctx.units[unit].key());
                coverage.add(unit, minutes);
                planned.push(PlannedSession {
                    unit,
                    date,
                    minutes,
                    role,
                    stage,
                });
            }
        }

        tracing::debug!(
            sessions = planned.len(),
            blocks = blocks.len(),
            cycle_days = cadence.cycle_days,
            laps = coverage.lap(),
            "cycle rotation finished"
        );
        planned
    }
}

/// Non-pinned unit indices grouped by block, blocks in first-seen order.
fn group_blocks(units: &[StudyUnit]) -> Vec<Vec<usize>> {
    let mut labels: Vec<&str> = Vec::new();
    let mut blocks: Vec<Vec<usize>> = Vec::new();

    for (index, unit) in units.iter().enumerate() {
        if unit.pinned {
            continue;
        }
        match labels.iter().position(|label| *label == unit.block) {
            Some(position) => blocks[position].push(index),
            None => {
                labels.push(&unit.block);
                blocks.push(vec![index]);
            }
        }
    }

    blocks
}

fn active_set(
    blocks: &[Vec<usize>],
    pinned: &[usize],
    coverage: &Coverage,
    cycle: usize,
    max_active: usize,
) -> Vec<usize> {
    // Pinned units leave one slot to the blocks; beyond that they take turns
    let pinned_cap = if blocks.is_empty() {
        max_active
    } else {
        max_active.saturating_sub(1).max(1)
    };
    let mut active = take_turn(pinned, cycle, pinned_cap);
    let slots = max_active.saturating_sub(active.len());
    if blocks.is_empty() || slots == 0 {
        return active;
    }

    let round = cycle / blocks.len();

    // Fall through to the next block when the scheduled one is fully covered
    for step in 0..blocks.len() {
        let block = &blocks[(cycle + step) % blocks.len()];
        let open: Vec<usize> = block
            .iter()
            .copied()
            .filter(|&i| !coverage.is_saturated(i))
            .collect();
        if open.is_empty() {
            continue;
        }

        let start = (round * slots) % open.len();
        let take = slots.min(open.len());
        active.extend((0..take).map(|k| open[(start + k) % open.len()]));
        break;
    }

    active
}

/// Up to `cap` members of `units`, advancing by `cap` every cycle.
fn take_turn(units: &[usize], cycle: usize, cap: usize) -> Vec<usize> {
    if units.len() <= cap {
        return units.to_vec();
    }
    let start = (cycle * cap) % units.len();
    (0..cap).map(|k| units[(start + k) % units.len()]).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        capacity::{DailyBudget, DateWindow, tests::weekdays},
        rotation::{SessionLimits, tests::unit},
        session::SessionRole,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run(units: &[StudyUnit], window: DateWindow, hours: f64) -> Vec<PlannedSession> {
        let capacity = weekdays(hours);
        let budget = DailyBudget::new(&capacity, window, &HashMap::new());
        let ctx = RotationContext {
            units,
            window,
            anchor: window.start,
            budget: &budget,
            weekly_hours: capacity.weekly_hours(),
            limits: SessionLimits::default(),
        };
        CycleRotation.rotate(&ctx, &mut SessionCounter::new())
    }

    #[test]
    fn test_daily_minutes_stay_within_capacity() {
        let units: Vec<_> = (0..5).map(|i| unit(if i < 3 { "a" } else { "b" }, 600)).collect();
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 2, 28));

        let planned = run(&units, window, 2.0);
        assert!(!planned.is_empty());

        let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
        for session in &planned {
            *per_day.entry(session.date).or_insert(0) += session.minutes;
            assert!(session.minutes >= 30 && session.minutes <= 120);
            assert_eq!(session.minutes % 15, 0);
        }
        assert!(per_day.values().all(|&m| m <= 120));
        assert!(planned.iter().all(|s| s.date.format("%a").to_string() != "Sat"));
    }

    #[test]
    fn test_each_unit_follows_role_sequence() {
        let units: Vec<_> = (0..4).map(|_| unit("a", 900)).collect();
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 3, 28));

        let planned = run(&units, window, 2.0);

        for index in 0..units.len() {
            let roles: Vec<_> = planned
                .iter()
                .filter(|s| s.unit == index)
                .map(|s| s.role)
                .collect();
            assert!(!roles.is_empty(), "unit {index} never scheduled");
            for (n, role) in roles.iter().enumerate() {
                assert_eq!(*role, SessionRole::for_counter(n as u32 + 1));
            }
        }
    }

    #[test]
    fn test_blocks_rotate_and_every_unit_gets_time() {
        let units = vec![unit("a", 240), unit("a", 240), unit("b", 240), unit("c", 240)];
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 2, 14));

        let planned = run(&units, window, 2.0);

        let scheduled: HashSet<usize> = planned.iter().map(|s| s.unit).collect();
        assert_eq!(scheduled.len(), units.len());

        // 10h/week gives 5-day cycles; the first cycle only touches block "a"
        let first_cycle: HashSet<usize> = planned
            .iter()
            .filter(|s| s.date < date(2025, 1, 11))
            .map(|s| s.unit)
            .collect();
        assert_eq!(first_cycle, HashSet::from([0, 1]));
    }

    #[test]
    fn test_pinned_units_are_always_active() {
        let mut units = vec![unit("a", 6000), unit("b", 6000), unit("c", 6000)];
        units[2].pinned = true;
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 1, 31));

        let planned = run(&units, window, 2.0);
        let days: HashSet<NaiveDate> = planned.iter().map(|s| s.date).collect();
        let pinned_days: HashSet<NaiveDate> = planned
            .iter()
            .filter(|s| s.unit == 2)
            .map(|s| s.date)
            .collect();
        assert_eq!(days, pinned_days);
    }

    #[test]
    fn test_saturated_block_is_skipped() {
        let units = vec![unit("a", 0), unit("b", 600)];
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 1, 10));

        let planned = run(&units, window, 2.0);
        assert!(planned.iter().all(|s| s.unit == 1));
    }

    #[test]
    fn test_pinned_units_never_exceed_active_cap() {
        // 10h/week allows 3 active units per day
        let mut units: Vec<_> = (0..6).map(|_| unit("a", 6000)).collect();
        for u in &mut units[..4] {
            u.pinned = true;
        }
        let window = DateWindow::new(date(2025, 1, 6), date(2025, 2, 28));

        let planned = run(&units, window, 2.0);

        let mut per_day: HashMap<NaiveDate, HashSet<usize>> = HashMap::new();
        for session in &planned {
            per_day.entry(session.date).or_default().insert(session.unit);
        }
        assert!(per_day.values().all(|set| set.len() <= 3));

        let scheduled: HashSet<usize> = planned.iter().map(|s| s.unit).collect();
        assert_eq!(scheduled.len(), units.len(), "every unit, pinned or not, gets time");
    }
}
