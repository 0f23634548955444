//! Session materializer: turns rotation output into session drafts while
//! booking each one against the per-date budget.

use std::collections::VecDeque;

use crate::{
    capacity::DailyBudget,
    rotation::{PlannedSession, SessionLimits},
    session::{SessionDraft, SessionOrigin, SessionRole, compose_note},
    topic::StudyUnit,
};

/// Walk `planned` chronologically and book every entry that fits.
///
/// An entry that does not fit at full length is clipped to whatever whole
/// slots remain, as long as that is at least the minimum session length.
/// Otherwise it is deferred: its role stays queued and its minutes are added to
/// the unit's next rotation entry, so the per-unit role sequence has no gaps.
pub fn materialize(
    units: &[StudyUnit],
    mut planned: Vec<PlannedSession>,
    budget: &mut DailyBudget,
    limits: SessionLimits,
) -> Vec<SessionDraft> {
    planned.sort_by_key(|p| p.date);

    let mut queued: Vec<VecDeque<(SessionRole, u32)>> = vec![VecDeque::new(); units.len()];
    let mut carry = vec![0_u32; units.len()];
    let mut drafts = Vec::with_capacity(planned.len());

    for entry in planned {
        let unit = &units[entry.unit];
        queued[entry.unit].push_back((entry.role, entry.stage));

        let wanted = (entry.minutes + carry[entry.unit]).min(limits.max_minutes());
        let available = limits.floor(budget.remaining(entry.date));
        let minutes = if wanted <= available {
            wanted
        } else if available >= limits.min_minutes() {
            available
        } else {
            carry[entry.unit] = wanted;
            continue;
        };

        let Some((role, stage)) = queued[entry.unit].pop_front() else {
            continue;
        };
        budget.consume(entry.date, minutes);
        carry[entry.unit] = 0;

        drafts.push(SessionDraft {
            topic: unit.topic.clone(),
            date: entry.date,
            minutes,
            role,
            origin: SessionOrigin::Rotation,
            review_stage: Some(stage),
            note: compose_note(role, &unit.title),
        });
    }

    let deferred: usize = queued.iter().map(VecDeque::len).sum();
    if deferred > 0 {
        tracing::debug!(deferred, "rotation entries left unplaced at the end of the window");
    }

    drafts
}
