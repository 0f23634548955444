use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    capacity::WeeklyCapacity,
    session::{SessionRecord, SessionRole, SessionStatus},
    topic::UnitKey,
};

/// Per-date occupancy of a plan, built from its persisted sessions.
#[derive(Debug, Clone, Default)]
pub struct PlanLedger {
    booked: HashMap<NaiveDate, u32>,
    topic_sessions: HashMap<(NaiveDate, Uuid), u32>,
    pending_reviews: HashSet<(NaiveDate, UnitKey)>,
}

impl PlanLedger {
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a SessionRecord>,
    {
        let mut ledger = Self::default();
        for session in sessions {
            ledger.add(session);
        }
        ledger
    }

    pub fn add(&mut self, session: &SessionRecord) {
        if session.status == SessionStatus::Skipped {
            return;
        }

        *self
            .topic_sessions
            .entry((session.date, session.topic.topic_id()))
            .or_insert(0) += 1;

        if session.status.occupies_capacity() {
            *self.booked.entry(session.date).or_insert(0) += session.minutes;
            if session.role == SessionRole::Review {
                self.pending_reviews.insert((session.date, session.topic.key()));
            }
        }
    }

    /// Minutes taken by pending and in-progress sessions on `date`.
    pub fn booked_minutes(&self, date: NaiveDate) -> u32 {
        self.booked.get(&date).copied().unwrap_or(0)
    }

    pub fn booked(&self) -> &HashMap<NaiveDate, u32> {
        &self.booked
    }

    pub fn spare_minutes(&self, capacity: &WeeklyCapacity, date: NaiveDate) -> u32 {
        capacity
            .minutes_on(date)
            .saturating_sub(self.booked_minutes(date))
    }

    /// Non-skipped sessions of `topic_id` on `date`, any sub-part.
    pub fn topic_sessions_on(&self, date: NaiveDate, topic_id: Uuid) -> u32 {
        self.topic_sessions
            .get(&(date, topic_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn has_pending_review(&self, date: NaiveDate, key: UnitKey) -> bool {
        self.pending_reviews.contains(&(date, key))
    }
}
