//! Session vocabulary shared by the scheduler, the materializer and storage.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::PlannerError,
    topic::{TopicRef, UnitKey, minutes_to_hours},
};

/// Pedagogical purpose of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Study,
    Review,
    Test,
}

impl SessionRole {
    /// Role of the `counter`-th session of a unit (1-based).
    ///
    /// `1 → Study`, then `Review, Review, Test` repeating from the second session on.
    pub const fn for_counter(counter: u32) -> Self {
        match counter {
            0 | 1 => Self::Study,
            n if (n - 2) % 3 == 2 => Self::Test,
            _ => Self::Review,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Review => "review",
            Self::Test => "test",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Study => "Study",
            Self::Review => "Review",
            Self::Test => "Test",
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl SessionStatus {
    /// Pending and in-progress sessions count against a day's capacity.
    pub const fn occupies_capacity(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// Which mechanism created a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Calendar generation or rebalance
    Rotation,
    /// Completion-triggered spaced repetition
    Repetition,
}

impl SessionOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::Repetition => "repetition",
        }
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = PlannerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == Self::$variant.as_str() {
                        return Ok(Self::$variant);
                    }
                )+
                Err(PlannerError::UnknownVariant {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_from_str!(SessionRole, "session role", [Study, Review, Test]);
impl_from_str!(SessionStatus, "session status", [Pending, InProgress, Completed, Skipped]);
impl_from_str!(SessionOrigin, "session origin", [Rotation, Repetition]);

/// A session ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    pub topic: TopicRef,
    pub date: NaiveDate,
    pub minutes: u32,
    pub role: SessionRole,
    pub origin: SessionOrigin,
    /// Rotation counter for rotation sessions, review number for repetition sessions
    pub review_stage: Option<u32>,
    pub note: String,
}

impl SessionDraft {
    pub fn hours(&self) -> f64 {
        minutes_to_hours(self.minutes)
    }

    /// Comparable tuple used to check that two generations produced the same calendar.
    pub fn fingerprint(&self) -> (Uuid, Option<u16>, NaiveDate, SessionRole, u32) {
        (
            self.topic.topic_id(),
            self.topic.part_index(),
            self.date,
            self.role,
            self.minutes,
        )
    }
}

/// New length of a pending session shortened to make room on its date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTrim {
    pub session_id: Uuid,
    pub minutes: u32,
}

/// A persisted session as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub topic: TopicRef,
    pub date: NaiveDate,
    pub minutes: u32,
    pub status: SessionStatus,
    pub role: SessionRole,
    pub origin: SessionOrigin,
    pub review_stage: Option<u32>,
    /// Minutes actually spent, recorded on completion
    pub completed_minutes: Option<u32>,
}

impl SessionRecord {
    /// Minutes credited to the topic once the session is completed.
    pub fn credited_minutes(&self) -> u32 {
        match self.status {
            SessionStatus::Completed => self.completed_minutes.unwrap_or(self.minutes),
            _ => 0,
        }
    }
}

/// Summary line stored with a generated session.
pub fn compose_note(role: SessionRole, title: &str) -> String {
    format!("{}: {title}", role.label())
}

/// Per-unit running count of rotation sessions within one generation run.
///
/// Created fresh for every generate or rebalance call and threaded through it.
#[derive(Debug, Clone, Default)]
pub struct SessionCounter {
    counts: HashMap<UnitKey, u32>,
}

impl SessionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from the highest stage already used by each unit's kept rotation sessions.
    pub fn seeded<'a, I>(history: I) -> Self
    where
        I: IntoIterator<Item = &'a SessionRecord>,
    {
        let mut counts: HashMap<UnitKey, u32> = HashMap::new();
        for record in history {
            if record.origin != SessionOrigin::Rotation || record.status == SessionStatus::Skipped {
                continue;
            }
            if let Some(stage) = record.review_stage {
                let entry = counts.entry(record.topic.key()).or_insert(0);
                *entry = (*entry).max(stage);
            }
        }
        Self { counts }
    }

    /// Advance the unit's counter and return the new value with its role.
    pub fn next(&mut self, key: UnitKey) -> (u32, SessionRole) {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        (*count, SessionRole::for_counter(*count))
    }

    pub fn current(&self, key: UnitKey) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(
        topic: TopicRef,
        date: NaiveDate,
        minutes: u32,
        status: SessionStatus,
        role: SessionRole,
        review_stage: Option<u32>,
    ) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            topic,
            date,
            minutes,
            status,
            role,
            origin: SessionOrigin::Rotation,
            review_stage,
            completed_minutes: None,
        }
    }

    #[test]
    fn test_role_sequence() {
        use SessionRole::{Review, Study, Test};

        let roles: Vec<_> = (1..=10).map(SessionRole::for_counter).collect();
        assert_eq!(
            roles,
            vec![Study, Review, Review, Test, Review, Review, Test, Review, Review, Test]
        );
    }

    #[test]
    fn test_counter_is_per_unit() {
        let a = UnitKey { topic_id: Uuid::new_v4(), part: None };
        let b = UnitKey { topic_id: a.topic_id, part: Some(1) };
        let mut counter = SessionCounter::new();

        assert_eq!(counter.next(a), (1, SessionRole::Study));
        assert_eq!(counter.next(a), (2, SessionRole::Review));
        assert_eq!(counter.next(b), (1, SessionRole::Study));
        assert_eq!(counter.current(a), 2);
    }

    #[test]
    fn test_seeded_counter_ignores_skipped_and_repetition_sessions() {
        let id = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let topic = TopicRef::Plain(id);

        let mut repetition = record(topic.clone(), day, 30, SessionStatus::Completed, SessionRole::Review, Some(9));
        repetition.origin = SessionOrigin::Repetition;
        let history = vec![
            record(topic.clone(), day, 60, SessionStatus::Completed, SessionRole::Study, Some(1)),
            record(topic.clone(), day, 60, SessionStatus::InProgress, SessionRole::Review, Some(2)),
            record(topic.clone(), day, 60, SessionStatus::Skipped, SessionRole::Review, Some(3)),
            repetition,
        ];

        let mut counter = SessionCounter::seeded(&history);
        assert_eq!(counter.next(topic.key()), (3, SessionRole::Review));
        assert_eq!(counter.next(topic.key()), (4, SessionRole::Test));
    }

    #[test]
    fn test_enum_strings_round_trip() {
        assert_eq!("in_progress".parse::<SessionStatus>().unwrap(), SessionStatus::InProgress);
        assert_eq!("test".parse::<SessionRole>().unwrap(), SessionRole::Test);
        assert_eq!("repetition".parse::<SessionOrigin>().unwrap(), SessionOrigin::Repetition);
        assert!("done".parse::<SessionStatus>().is_err());
        assert_eq!(SessionStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_credited_minutes_only_for_completed() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let mut r = record(TopicRef::Plain(Uuid::new_v4()), day, 60, SessionStatus::Completed, SessionRole::Study, Some(1));
        assert_eq!(r.credited_minutes(), 60);
        r.completed_minutes = Some(45);
        assert_eq!(r.credited_minutes(), 45);
        r.status = SessionStatus::Skipped;
        assert_eq!(r.credited_minutes(), 0);
    }
}
