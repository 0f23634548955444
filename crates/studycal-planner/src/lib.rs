//! Scheduling engine for adaptive study calendars
//!
//! This crate turns a topic catalog, a weekly capacity table and an exam date
//! into a day-by-day calendar of study, review and test sessions. It also
//! keeps the calendar adaptive: completed sessions feed an SM-2 scheduler that
//! places follow-up reviews, skipped sessions are moved to a make-up day, and a
//! rebalance regenerates everything after a cut-off date without touching
//! history.
//!
//! Everything here is pure and synchronous. Persistence and transport live in
//! the `studycal-db` and `studycal-api` crates.

pub mod capacity;
pub mod error;
pub mod feasibility;
pub mod ledger;
pub mod materializer;
pub mod planner;
pub mod rebalance;
pub mod reschedule;
pub mod rotation;
pub mod session;
pub mod srs;
pub mod topic;

pub use capacity::{DateWindow, WeekdayHours, WeeklyCapacity};
pub use error::{PlannerError, Remediation};
pub use feasibility::{FeasibilityReport, WorkloadRates};
pub use ledger::PlanLedger;
pub use planner::{
    Calendar, Completion, CompletionInput, PlanFrame, Planner, PlannerConfig, ScheduledReview,
};
pub use rotation::{RotationStrategy, SessionLimits, StrategyKind};
pub use session::{
    SessionDraft, SessionOrigin, SessionRecord, SessionRole, SessionStatus, SessionTrim,
};
pub use srs::{ProgressByTopic, Quality, TopicProgress};
pub use topic::{Complexity, Topic, TopicCatalog, TopicRef, UnitKey};
