//! Topic catalog: reference data supplied by the caller and the study units
//! derived from it.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::PlannerError, feasibility::WorkloadRates};

/// Block label used for topics that do not declare one.
pub const DEFAULT_BLOCK: &str = "general";

/// Estimated difficulty tier of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Number of periodic reviews a topic of this tier needs before the exam.
    pub const fn review_count(self) -> u32 {
        match self {
            Self::Low | Self::Medium => 3,
            Self::High => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Complexity {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(PlannerError::UnknownVariant {
                kind: "complexity",
                value: other.to_string(),
            }),
        }
    }
}

const fn default_multiplier() -> f64 {
    1.0
}

/// A unit of exam-syllabus content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub complexity: Complexity,
    /// Base study hours before reviews and tests
    pub estimated_hours: f64,
    /// Ordered sub-part labels; each one is scheduled independently
    #[serde(default)]
    pub sub_parts: Vec<String>,
    /// Catalog grouping used by the rotation to pick the active block
    #[serde(default)]
    pub block: Option<String>,
    /// Share of daily time relative to other active topics (1.0 = even)
    #[serde(default = "default_multiplier")]
    pub priority_multiplier: f64,
    /// Keep this topic in the active set regardless of the rotating block
    #[serde(default)]
    pub pinned: bool,
}

impl Topic {
    pub fn block_label(&self) -> &str {
        self.block.as_deref().unwrap_or(DEFAULT_BLOCK)
    }

    fn validate(&self) -> Result<(), PlannerError> {
        let invalid = |reason: &str| PlannerError::InvalidTopic {
            id: self.id,
            reason: reason.to_string(),
        };

        if self.title.trim().is_empty() {
            return Err(invalid("title cannot be empty"));
        }
        if !self.estimated_hours.is_finite() || self.estimated_hours < 0.0 {
            return Err(invalid("estimated hours must be a non-negative number"));
        }
        if !self.priority_multiplier.is_finite() || self.priority_multiplier <= 0.0 {
            return Err(invalid("priority multiplier must be positive"));
        }
        if self.sub_parts.len() > usize::from(u16::MAX) {
            return Err(invalid("too many sub-parts"));
        }
        if self.sub_parts.iter().any(|label| label.trim().is_empty()) {
            return Err(invalid("sub-part labels cannot be empty"));
        }
        Ok(())
    }
}

/// Reference to a schedulable unit: a whole topic or one of its sub-parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicRef {
    Plain(Uuid),
    SubPart(Uuid, u16, String),
}

impl TopicRef {
    /// Rebuild a reference from its stored columns.
    pub fn from_columns(topic_id: Uuid, part_index: Option<i16>, label: Option<String>) -> Self {
        match (part_index, label) {
            (Some(index), Some(label)) if index >= 0 => Self::SubPart(topic_id, index as u16, label),
            _ => Self::Plain(topic_id),
        }
    }

    pub const fn topic_id(&self) -> Uuid {
        match self {
            Self::Plain(id) | Self::SubPart(id, _, _) => *id,
        }
    }

    pub const fn part_index(&self) -> Option<u16> {
        match self {
            Self::Plain(_) => None,
            Self::SubPart(_, index, _) => Some(*index),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::SubPart(_, _, label) => Some(label),
        }
    }

    pub const fn key(&self) -> UnitKey {
        UnitKey {
            topic_id: self.topic_id(),
            part: self.part_index(),
        }
    }
}

impl fmt::Display for TopicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(id) => write!(f, "{id}"),
            Self::SubPart(id, index, _) => write!(f, "{id}#{index}"),
        }
    }
}

/// Hashable identity of a study unit, ignoring the display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub topic_id: Uuid,
    pub part: Option<u16>,
}

/// A schedulable pseudo-topic: a plain topic or one sub-part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyUnit {
    pub topic: TopicRef,
    pub title: String,
    pub block: String,
    pub multiplier: f64,
    pub pinned: bool,
    /// Minutes this unit should receive before it leaves the active rotation
    pub target_minutes: u32,
    /// Minutes of review and test work used for consolidation laps
    pub consolidation_minutes: u32,
}

impl StudyUnit {
    pub const fn key(&self) -> UnitKey {
        self.topic.key()
    }
}

/// Display title of a unit: the topic title, plus the sub-part label in parentheses.
pub fn unit_title(topic: &Topic, topic_ref: &TopicRef) -> String {
    match topic_ref.label() {
        Some(label) => format!("{} ({label})", topic.title),
        None => topic.title.clone(),
    }
}

/// Expand topics into study units, splitting a topic's requirement evenly across its sub-parts.
///
/// `spent_hours` lowers each topic's requirement by the time already completed on it.
pub fn expand_units(
    topics: &[Topic],
    rates: &WorkloadRates,
    spent_hours: &HashMap<Uuid, f64>,
) -> Vec<StudyUnit> {
    let mut units = Vec::new();

    for topic in topics {
        let spent = spent_hours.get(&topic.id).copied().unwrap_or(0.0);
        let required = (rates.required_hours(topic) - spent).max(0.0);
        let consolidation = rates.consolidation_hours(topic);
        let parts = topic.sub_parts.len().max(1) as f64;

        let target_minutes = hours_to_minutes(required / parts);
        let consolidation_minutes = hours_to_minutes(consolidation / parts);

        let make = |topic_ref: TopicRef| StudyUnit {
            title: unit_title(topic, &topic_ref),
            topic: topic_ref,
            block: topic.block_label().to_string(),
            multiplier: topic.priority_multiplier,
            pinned: topic.pinned,
            target_minutes,
            consolidation_minutes,
        };

        if topic.sub_parts.is_empty() {
            units.push(make(TopicRef::Plain(topic.id)));
        } else {
            for (index, label) in topic.sub_parts.iter().enumerate() {
                units.push(make(TopicRef::SubPart(topic.id, index as u16, label.clone())));
            }
        }
    }

    units
}

/// Validated, id-indexed view over a set of topics.
#[derive(Debug, Clone, Default)]
pub struct TopicCatalog {
    topics: Vec<Topic>,
    index: HashMap<Uuid, usize>,
}

impl TopicCatalog {
    pub fn new(topics: Vec<Topic>) -> Result<Self, PlannerError> {
        let mut index = HashMap::with_capacity(topics.len());

        for (position, topic) in topics.iter().enumerate() {
            topic.validate()?;
            if index.insert(topic.id, position).is_some() {
                return Err(PlannerError::InvalidTopic {
                    id: topic.id,
                    reason: "duplicate topic id".to_string(),
                });
            }
        }

        Ok(Self { topics, index })
    }

    pub fn get(&self, id: Uuid) -> Result<&Topic, PlannerError> {
        self.index
            .get(&id)
            .map(|&position| &self.topics[position])
            .ok_or(PlannerError::TopicNotFound(id))
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Resolve the given ids in catalog order. Fails on the first unknown id.
    pub fn select<I>(&self, ids: I) -> Result<Vec<Topic>, PlannerError>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut positions = Vec::new();
        for id in ids {
            let position = *self
                .index
                .get(&id)
                .ok_or(PlannerError::TopicNotFound(id))?;
            if !positions.contains(&position) {
                positions.push(position);
            }
        }
        positions.sort_unstable();

        Ok(positions
            .into_iter()
            .map(|position| self.topics[position].clone())
            .collect())
    }
}

/// Whole minutes in `hours`, rounded; non-positive or non-finite input is zero.
pub fn hours_to_minutes(hours: f64) -> u32 {
    if hours.is_finite() && hours > 0.0 {
        (hours * 60.0).round() as u32
    } else {
        0
    }
}

pub fn minutes_to_hours(minutes: u32) -> f64 {
    f64::from(minutes) / 60.0
}
