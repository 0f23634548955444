//! History handling for partial regeneration.
//!
//! A rebalance replaces the pending sessions on or after a cut-off date. Every
//! other session (completed, skipped, in progress, or pending before the
//! cut-off) is history and is only read.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::PlannerError,
    session::{SessionRecord, SessionStatus},
    topic::{Topic, TopicCatalog, minutes_to_hours},
};

/// Sessions split at a cut-off date.
#[derive(Debug, Clone, Default)]
pub struct HistorySplit<'a> {
    /// Pending sessions on or after the cut-off, to be deleted
    pub replaced: Vec<&'a SessionRecord>,
    /// Everything else
    pub kept: Vec<&'a SessionRecord>,
}

impl<'a> HistorySplit<'a> {
    pub fn at(sessions: &'a [SessionRecord], cutoff: NaiveDate) -> Self {
        let (replaced, kept) = sessions
            .iter()
            .partition(|s| s.status == SessionStatus::Pending && s.date >= cutoff);
        Self { replaced, kept }
    }

    pub fn replaced_ids(&self) -> Vec<Uuid> {
        self.replaced.iter().map(|s| s.id).collect()
    }
}

/// Topics present in a plan's sessions, resolved against its catalog.
///
/// A plan without any sessions falls back to the whole catalog. A session whose
/// topic is missing from the catalog fails the whole operation.
pub fn topics_in_plan(
    sessions: &[SessionRecord],
    catalog: &TopicCatalog,
) -> Result<Vec<Topic>, PlannerError> {
    if sessions.is_empty() {
        return Ok(catalog.topics().to_vec());
    }
    catalog.select(sessions.iter().map(|s| s.topic.topic_id()))
}

/// Completed hours per topic.
pub fn spent_hours<'a, I>(sessions: I) -> HashMap<Uuid, f64>
where
    I: IntoIterator<Item = &'a SessionRecord>,
{
    let mut minutes: HashMap<Uuid, u32> = HashMap::new();
    for session in sessions {
        let credited = session.credited_minutes();
        if credited > 0 {
            *minutes.entry(session.topic.topic_id()).or_insert(0) += credited;
        }
    }
    minutes
        .into_iter()
        .map(|(id, m)| (id, minutes_to_hours(m)))
        .collect()
}
