//! Entry points tying the engine together.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::{
    capacity::{DailyBudget, DateWindow, WeeklyCapacity},
    error::PlannerError,
    feasibility::{self, FeasibilityReport, WorkloadRates},
    ledger::PlanLedger,
    materializer::materialize,
    rebalance::{HistorySplit, spent_hours, topics_in_plan},
    reschedule::find_make_up_date,
    rotation::{RotationContext, SessionLimits, StrategyKind},
    session::{
        SessionCounter, SessionDraft, SessionOrigin, SessionRecord, SessionRole, SessionStatus,
        SessionTrim, compose_note,
    },
    srs::{
        ProgressByTopic, Quality, TopicProgress, place_in_window, place_review,
        review_target_date, trim_for_review,
    },
    topic::{Topic, TopicCatalog, TopicRef, expand_units, minutes_to_hours, unit_title},
};

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    pub rates: WorkloadRates,
    pub limits: SessionLimits,
    pub strategy: StrategyKind,
    /// Length of a completion-triggered review session
    pub review_minutes: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            rates: WorkloadRates::default(),
            limits: SessionLimits::default(),
            strategy: StrategyKind::default(),
            review_minutes: 30,
        }
    }
}

/// Dates and weekly capacity of one study plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanFrame {
    pub start: NaiveDate,
    pub exam: NaiveDate,
    pub capacity: WeeklyCapacity,
}

impl PlanFrame {
    pub fn new(
        start: NaiveDate,
        exam: NaiveDate,
        capacity: WeeklyCapacity,
    ) -> Result<Self, PlannerError> {
        if exam <= start {
            return Err(PlannerError::InvalidDateRange { start, exam });
        }
        Ok(Self {
            start,
            exam,
            capacity,
        })
    }

    /// Sessions are placed from `from` up to the day before the exam.
    pub fn scheduling_window(&self, from: NaiveDate) -> DateWindow {
        let last = self.exam.checked_sub_days(Days::new(1)).unwrap_or(self.start);
        DateWindow::new(from.max(self.start), last)
    }

    fn horizon_days(&self) -> i64 {
        (self.exam - self.start).num_days()
    }
}

/// Result of a generation or rebalance.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub report: FeasibilityReport,
    pub strategy: &'static str,
    /// Full workload of the plan's topics, before completed hours are deducted
    pub estimated_hours: f64,
    /// Pending sessions that the new ones replace
    pub replaced: Vec<Uuid>,
    pub sessions: Vec<SessionDraft>,
}

/// Learner input recorded with a completed session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionInput {
    pub quality: Quality,
    /// Time actually spent; defaults to the scheduled length
    pub completed_hours: Option<f64>,
    pub today: NaiveDate,
}

/// Where the follow-up review of a completed session goes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledReview {
    /// A pending review of the same unit already sits on the target date
    Existing { session_id: Uuid, date: NaiveDate },
    /// A new review, possibly after shortening a rotation session on its date
    New {
        draft: SessionDraft,
        trimmed: Option<SessionTrim>,
    },
}

impl ScheduledReview {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Existing { date, .. } => *date,
            Self::New { draft, .. } => draft.date,
        }
    }
}

/// Result of recording a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub progress: TopicProgress,
    /// Follow-up review, absent when no day before the exam has room
    pub review: Option<ScheduledReview>,
}

#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub const fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Run the feasibility check for a fresh plan over `[start, exam]`.
    pub fn check_feasibility(
        &self,
        frame: &PlanFrame,
        topics: &[Topic],
    ) -> Result<FeasibilityReport, PlannerError> {
        feasibility::check(
            frame.start,
            frame.exam,
            &frame.capacity,
            topics.iter().map(|t| (t, 0.0)),
            &self.config.rates,
        )
    }

    /// Build the full calendar for a plan.
    ///
    /// `existing` are the sessions already stored for the plan; pending ones are
    /// replaced and the rest is kept as history. `progress` holds the stored
    /// statistics, used to carry due repetition reviews over.
    pub fn generate(
        &self,
        frame: &PlanFrame,
        catalog: &TopicCatalog,
        existing: &[SessionRecord],
        progress: &ProgressByTopic,
    ) -> Result<Calendar, PlannerError> {
        let report = self.check_feasibility(frame, catalog.topics())?;
        Ok(self.rebuild(frame, catalog.topics(), existing, progress, frame.start, report))
    }

    /// Regenerate the calendar from `cutoff` on, leaving history untouched.
    ///
    /// Repetition reviews replaced past the cut-off are placed again from the
    /// topic statistics in `progress`.
    pub fn rebalance(
        &self,
        frame: &PlanFrame,
        catalog: &TopicCatalog,
        existing: &[SessionRecord],
        progress: &ProgressByTopic,
        cutoff: NaiveDate,
    ) -> Result<Calendar, PlannerError> {
        let cutoff = cutoff.max(frame.start).min(frame.exam);
        let topics = topics_in_plan(existing, catalog)?;
        let spent = spent_hours(existing);

        let report = feasibility::check(
            cutoff,
            frame.exam,
            &frame.capacity,
            topics
                .iter()
                .map(|t| (t, spent.get(&t.id).copied().unwrap_or(0.0))),
            &self.config.rates,
        )?;

        Ok(self.rebuild(frame, &topics, existing, progress, cutoff, report))
    }

    fn rebuild(
        &self,
        frame: &PlanFrame,
        topics: &[Topic],
        existing: &[SessionRecord],
        progress: &ProgressByTopic,
        cutoff: NaiveDate,
        report: FeasibilityReport,
    ) -> Calendar {
        let history = HistorySplit::at(existing, cutoff);
        let spent = spent_hours(history.kept.iter().copied());
        let units = expand_units(topics, &self.config.rates, &spent);

        let window = frame.scheduling_window(cutoff);
        let ledger = PlanLedger::from_sessions(history.kept.iter().copied());
        let mut budget = DailyBudget::new(&frame.capacity, window, ledger.booked());
        let mut counter = SessionCounter::seeded(history.kept.iter().copied());

        // Due reviews are booked before the rotation takes the remaining time
        let mut sessions =
            self.carry_reviews(topics, &history, progress, window, &ledger, &mut budget);

        let strategy = self.config.strategy.build(frame.horizon_days());
        let ctx = RotationContext {
            units: &units,
            window,
            anchor: frame.start,
            budget: &budget,
            weekly_hours: frame.capacity.weekly_hours(),
            limits: self.config.limits,
        };
        let planned = strategy.rotate(&ctx, &mut counter);
        let carried = sessions.len();
        sessions.extend(materialize(&units, planned, &mut budget, self.config.limits));

        tracing::debug!(
            strategy = strategy.name(),
            units = units.len(),
            replaced = history.replaced.len(),
            carried,
            sessions = sessions.len(),
            %cutoff,
            "calendar rebuilt"
        );

        Calendar {
            report,
            strategy: strategy.name(),
            estimated_hours: topics.iter().map(|t| self.config.rates.required_hours(t)).sum(),
            replaced: history.replaced_ids(),
            sessions,
        }
    }

    /// One repetition review per topic whose last one was replaced, placed
    /// near `last_reviewed_at + interval_days` inside `window`.
    ///
    /// Topics that still hold an open repetition review in history are skipped.
    fn carry_reviews(
        &self,
        topics: &[Topic],
        history: &HistorySplit<'_>,
        progress: &ProgressByTopic,
        window: DateWindow,
        ledger: &PlanLedger,
        budget: &mut DailyBudget,
    ) -> Vec<SessionDraft> {
        let minutes = self.config.review_minutes;
        let open: HashSet<Uuid> = history
            .kept
            .iter()
            .filter(|s| s.origin == SessionOrigin::Repetition && s.status.occupies_capacity())
            .map(|s| s.topic.topic_id())
            .collect();

        let mut drafts = Vec::new();
        for topic in topics.iter().filter(|t| !open.contains(&t.id)) {
            let Some(stats) = progress.get(&topic.id) else {
                continue;
            };
            let Some(due) = stats.due_date() else {
                continue;
            };

            // Keep the unit of the replaced review, else the last one studied
            let topic_ref = history
                .replaced
                .iter()
                .find(|s| s.origin == SessionOrigin::Repetition && s.topic.topic_id() == topic.id)
                .or_else(|| {
                    history
                        .kept
                        .iter()
                        .filter(|s| {
                            s.status == SessionStatus::Completed && s.topic.topic_id() == topic.id
                        })
                        .max_by_key(|s| s.date)
                })
                .map_or(TopicRef::Plain(topic.id), |s| s.topic.clone());

            let Some(date) = place_in_window(budget, ledger, topic_ref.key(), due, window, minutes)
            else {
                tracing::debug!(topic_id = %topic.id, %due, "no room to carry a review over");
                continue;
            };
            budget.consume(date, minutes);

            drafts.push(SessionDraft {
                note: compose_note(SessionRole::Review, &unit_title(topic, &topic_ref)),
                topic: topic_ref,
                date,
                minutes,
                role: SessionRole::Review,
                origin: SessionOrigin::Repetition,
                review_stage: Some(stats.total_reviews),
            });
        }

        drafts
    }

    /// Fold a completed session into the topic's statistics and place the next review.
    ///
    /// `sessions` must reflect the plan after the session is marked completed.
    pub fn complete(
        &self,
        frame: &PlanFrame,
        title: &str,
        session: &SessionRecord,
        progress: &TopicProgress,
        input: CompletionInput,
        sessions: &[SessionRecord],
    ) -> Completion {
        let CompletionInput {
            quality,
            completed_hours,
            today,
        } = input;
        let hours = completed_hours.unwrap_or_else(|| minutes_to_hours(session.minutes));
        let progress = progress.record_review(quality, hours, today);

        let review = review_target_date(today, progress.interval_days, frame.exam).and_then(
            |target| {
                let draft = SessionDraft {
                    topic: session.topic.clone(),
                    date: target,
                    minutes: self.config.review_minutes,
                    role: SessionRole::Review,
                    origin: SessionOrigin::Repetition,
                    review_stage: Some(progress.total_reviews),
                    note: compose_note(SessionRole::Review, title),
                };
                self.schedule_review(frame, draft, today, sessions)
            },
        );

        tracing::debug!(
            interval_days = progress.interval_days,
            ease_factor = progress.ease_factor,
            review_date = ?review.as_ref().map(ScheduledReview::date),
            "completion recorded"
        );

        Completion { progress, review }
    }

    /// Book `draft` on its date, or as close to it as capacity allows.
    ///
    /// A pending review of the unit already there is reused. A full date gives
    /// up time from one of its rotation sessions; only when none can spare it
    /// does the review move to the nearest day with room.
    fn schedule_review(
        &self,
        frame: &PlanFrame,
        mut draft: SessionDraft,
        today: NaiveDate,
        sessions: &[SessionRecord],
    ) -> Option<ScheduledReview> {
        let key = draft.topic.key();
        let target = draft.date;
        if let Some(existing) = sessions.iter().find(|s| {
            s.date == target
                && s.status == SessionStatus::Pending
                && s.role == SessionRole::Review
                && s.topic.key() == key
        }) {
            return Some(ScheduledReview::Existing {
                session_id: existing.id,
                date: target,
            });
        }

        let minutes = draft.minutes;
        let ledger = PlanLedger::from_sessions(sessions);
        let spare = ledger.spare_minutes(&frame.capacity, target);
        let mut trimmed = None;
        if spare < minutes {
            trimmed = trim_for_review(sessions, target, key, minutes - spare, self.config.limits);
            if trimmed.is_none() {
                draft.date =
                    place_review(&ledger, &frame.capacity, key, target, today, frame.exam, minutes)?;
            }
        }

        Some(ScheduledReview::New { draft, trimmed })
    }

    /// Copy of a skipped session on the next day that can take it.
    ///
    /// `ledger` must reflect the plan after the session is marked skipped.
    pub fn reschedule_skipped(
        &self,
        frame: &PlanFrame,
        title: &str,
        skipped: &SessionRecord,
        ledger: &PlanLedger,
        today: NaiveDate,
    ) -> Option<SessionDraft> {
        let date = find_make_up_date(ledger, &frame.capacity, skipped, today, frame.exam)?;

        Some(SessionDraft {
            topic: skipped.topic.clone(),
            date,
            minutes: skipped.minutes,
            role: skipped.role,
            origin: skipped.origin,
            review_stage: skipped.review_stage,
            note: compose_note(skipped.role, title),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::{
        capacity::tests::weekdays,
        session::SessionStatus,
        topic::{Complexity, TopicRef, tests::topic},
    };

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn no_progress() -> ProgressByTopic {
        ProgressByTopic::new()
    }

    fn frame(exam: NaiveDate) -> PlanFrame {
        PlanFrame::new(date(1, 6), exam, weekdays(2.0)).unwrap()
    }

    fn catalog() -> TopicCatalog {
        let mut cells = topic("Cells", 8.0, Complexity::Medium);
        cells.sub_parts = vec!["Membranes".to_string(), "Mitosis".to_string()];
        cells.block = Some("biology".to_string());
        let mut genetics = topic("Genetics", 8.0, Complexity::Medium);
        genetics.block = Some("biology".to_string());
        let mut optics = topic("Optics", 8.0, Complexity::High);
        optics.block = Some("physics".to_string());
        TopicCatalog::new(vec![cells, genetics, optics]).unwrap()
    }

    /// Persist drafts the way storage would.
    fn stored(drafts: &[SessionDraft]) -> Vec<SessionRecord> {
        drafts
            .iter()
            .map(|d| SessionRecord {
                id: Uuid::new_v4(),
                topic: d.topic.clone(),
                date: d.date,
                minutes: d.minutes,
                status: SessionStatus::Pending,
                role: d.role,
                origin: d.origin,
                review_stage: d.review_stage,
                completed_minutes: None,
            })
            .collect()
    }

    fn per_day(sessions: &[SessionRecord]) -> HashMap<NaiveDate, u32> {
        let mut totals = HashMap::new();
        for s in sessions.iter().filter(|s| s.status.occupies_capacity()) {
            *totals.entry(s.date).or_insert(0) += s.minutes;
        }
        totals
    }

    fn assert_within_capacity(frame: &PlanFrame, sessions: &[SessionRecord]) {
        for (day, minutes) in per_day(sessions) {
            assert!(
                minutes <= frame.capacity.minutes_on(day),
                "{day} booked {minutes} minutes"
            );
        }
    }

    /// Stages of each unit run 1, 2, 3, … and roles follow them.
    fn assert_role_sequences(sessions: &[SessionRecord]) {
        let mut by_unit: HashMap<_, Vec<_>> = HashMap::new();
        for s in sessions.iter().filter(|s| s.origin == SessionOrigin::Rotation) {
            by_unit.entry(s.topic.key()).or_default().push(s);
        }
        for (_, mut list) in by_unit {
            list.sort_by_key(|s| s.review_stage);
            for (n, s) in list.iter().enumerate() {
                assert_eq!(s.review_stage, Some(n as u32 + 1));
                assert_eq!(s.role, SessionRole::for_counter(n as u32 + 1));
            }
        }
    }

    #[test]
    fn test_generate_sixty_day_plan() {
        let frame = frame(date(3, 7));
        let catalog = catalog();

        let calendar = Planner::default().generate(&frame, &catalog, &[], &no_progress()).unwrap();
        assert_eq!(calendar.strategy, "cycle");
        assert!(calendar.replaced.is_empty());

        let sessions = stored(&calendar.sessions);
        assert_within_capacity(&frame, &sessions);
        assert_role_sequences(&sessions);

        let units: HashSet<_> = sessions.iter().map(|s| s.topic.key()).collect();
        assert_eq!(units.len(), 4);
        assert!(sessions.iter().all(|s| s.date < frame.exam));
        assert!(
            sessions
                .iter()
                .any(|s| s.topic.label() == Some("Mitosis"))
        );
    }

    #[test]
    fn test_generate_rejects_infeasible_plan_before_scheduling() {
        let frame = frame(date(1, 13));
        let err = Planner::default().generate(&frame, &catalog(), &[], &no_progress()).unwrap_err();
        assert!(err.deficit_hours().is_some_and(|d| d > 0.0));
    }

    #[test]
    fn test_long_plan_uses_phased_strategy() {
        let frame = frame(date(7, 1));
        let calendar = Planner::default().generate(&frame, &catalog(), &[], &no_progress()).unwrap();
        assert_eq!(calendar.strategy, "phased");

        let sessions = stored(&calendar.sessions);
        assert_within_capacity(&frame, &sessions);
        assert_role_sequences(&sessions);
    }

    #[test]
    fn test_rebalance_keeps_history_and_is_idempotent() {
        let frame = frame(date(3, 7));
        let catalog = catalog();
        let planner = Planner::default();

        let mut sessions = stored(&planner.generate(&frame, &catalog, &[], &no_progress()).unwrap().sessions);
        let cutoff = date(1, 20);
        for s in sessions.iter_mut().filter(|s| s.date < date(1, 15)) {
            s.status = SessionStatus::Completed;
        }
        if let Some(s) = sessions.iter_mut().find(|s| s.date == date(1, 16)) {
            s.status = SessionStatus::Skipped;
        }
        if let Some(s) = sessions.iter_mut().find(|s| s.date == date(1, 22)) {
            s.status = SessionStatus::InProgress;
        }
        let history: Vec<SessionRecord> = sessions
            .iter()
            .filter(|s| s.status != SessionStatus::Pending || s.date < cutoff)
            .cloned()
            .collect();

        let first = planner.rebalance(&frame, &catalog, &sessions, &no_progress(), cutoff).unwrap();
        assert!(first.sessions.iter().all(|d| d.date >= cutoff));
        assert_eq!(
            first.replaced.len(),
            sessions.len() - history.len()
        );

        // Apply the first rebalance
        let mut after: Vec<SessionRecord> = history.clone();
        after.extend(stored(&first.sessions));
        assert_within_capacity(&frame, &after);
        let mut seen = HashSet::new();
        for s in after
            .iter()
            .filter(|s| s.origin == SessionOrigin::Rotation && s.status != SessionStatus::Skipped)
        {
            let stage = s.review_stage.unwrap();
            assert!(seen.insert((s.topic.key(), stage)), "stage {stage} reused");
            assert_eq!(s.role, SessionRole::for_counter(stage));
        }

        let second = planner.rebalance(&frame, &catalog, &after, &no_progress(), cutoff).unwrap();
        let fingerprints = |drafts: &[SessionDraft]| {
            let mut f: Vec<_> = drafts.iter().map(SessionDraft::fingerprint).collect();
            f.sort();
            f
        };
        assert_eq!(fingerprints(&first.sessions), fingerprints(&second.sessions));

        // History is never among the replaced sessions
        for kept in &history {
            assert!(!second.replaced.contains(&kept.id));
        }
    }

    #[test]
    fn test_rebalance_fails_on_topic_missing_from_catalog() {
        let frame = frame(date(3, 7));
        let stray = stored(&[SessionDraft {
            topic: TopicRef::Plain(Uuid::new_v4()),
            date: date(1, 7),
            minutes: 60,
            role: SessionRole::Study,
            origin: SessionOrigin::Rotation,
            review_stage: Some(1),
            note: String::new(),
        }]);

        let err = Planner::default()
            .rebalance(&frame, &catalog(), &stray, &no_progress(), date(1, 8))
            .unwrap_err();
        assert!(matches!(err, PlannerError::TopicNotFound(_)));
    }

    fn completed_study(topic: TopicRef, day: NaiveDate) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            topic,
            date: day,
            minutes: 60,
            status: SessionStatus::Completed,
            role: SessionRole::Study,
            origin: SessionOrigin::Rotation,
            review_stage: Some(1),
            completed_minutes: None,
        }
    }

    fn pending(topic: TopicRef, day: NaiveDate, minutes: u32, role: SessionRole) -> SessionRecord {
        SessionRecord {
            status: SessionStatus::Pending,
            minutes,
            role,
            ..completed_study(topic, day)
        }
    }

    fn recall(value: u8, today: NaiveDate) -> CompletionInput {
        CompletionInput {
            quality: Quality::new(value).unwrap(),
            completed_hours: None,
            today,
        }
    }

    fn new_review(review: Option<ScheduledReview>) -> (SessionDraft, Option<SessionTrim>) {
        match review {
            Some(ScheduledReview::New { draft, trimmed }) => (draft, trimmed),
            other => panic!("expected a new review, got {other:?}"),
        }
    }

    #[test]
    fn test_completion_with_perfect_recall_schedules_next_day_review() {
        let frame = frame(date(3, 7));
        let today = date(1, 6);
        let topic_ref = TopicRef::Plain(Uuid::new_v4());
        let session = completed_study(topic_ref.clone(), today);

        let completion = Planner::default().complete(
            &frame,
            "Optics",
            &session,
            &TopicProgress::default(),
            recall(5, today),
            std::slice::from_ref(&session),
        );

        assert_eq!(completion.progress.interval_days, 1);
        assert!((completion.progress.ease_factor - 2.6).abs() < 1e-9);
        assert_eq!(completion.progress.hours_spent, 1.0);

        let (review, trimmed) = new_review(completion.review);
        assert_eq!(trimmed, None);
        assert_eq!(review.date, date(1, 7));
        assert_eq!(review.role, SessionRole::Review);
        assert_eq!(review.origin, SessionOrigin::Repetition);
        assert_eq!(review.minutes, 30);
        assert_eq!(review.review_stage, Some(1));
        assert_eq!(review.topic, topic_ref);
        assert_eq!(review.note, "Review: Optics");
    }

    #[test]
    fn test_completion_review_respects_capacity() {
        let frame = frame(date(3, 7));
        let today = date(1, 6);
        let session = completed_study(TopicRef::Plain(Uuid::new_v4()), today);
        // In-progress sessions are never shortened
        let mut blocking = pending(TopicRef::Plain(Uuid::new_v4()), date(1, 7), 120, SessionRole::Study);
        blocking.status = SessionStatus::InProgress;

        let completion = Planner::default().complete(
            &frame,
            "Optics",
            &session,
            &TopicProgress::default(),
            CompletionInput {
                quality: Quality::default(),
                completed_hours: Some(0.75),
                today,
            },
            &[blocking, session.clone()],
        );

        assert_eq!(completion.review.map(|r| r.date()), Some(date(1, 8)));
        assert_eq!(completion.progress.hours_spent, 0.75);
    }

    #[test]
    fn test_completion_shortens_a_rotation_session_on_a_full_day() {
        let frame = frame(date(3, 7));
        let today = date(1, 6);
        let session = completed_study(TopicRef::Plain(Uuid::new_v4()), today);
        let blocking = pending(TopicRef::Plain(Uuid::new_v4()), date(1, 7), 120, SessionRole::Study);

        let completion = Planner::default().complete(
            &frame,
            "Optics",
            &session,
            &TopicProgress::default(),
            recall(5, today),
            &[blocking.clone(), session.clone()],
        );

        let (review, trimmed) = new_review(completion.review);
        assert_eq!(review.date, date(1, 7));
        assert_eq!(
            trimmed,
            Some(SessionTrim {
                session_id: blocking.id,
                minutes: 90
            })
        );
    }

    #[test]
    fn test_completion_reuses_pending_review_of_the_unit() {
        let frame = frame(date(3, 7));
        let today = date(1, 6);
        let topic_ref = TopicRef::Plain(Uuid::new_v4());
        let session = completed_study(topic_ref.clone(), today);
        let booked = pending(topic_ref, date(1, 7), 45, SessionRole::Review);

        let completion = Planner::default().complete(
            &frame,
            "Optics",
            &session,
            &TopicProgress::default(),
            recall(5, today),
            &[booked.clone(), session.clone()],
        );

        assert_eq!(
            completion.review,
            Some(ScheduledReview::Existing {
                session_id: booked.id,
                date: date(1, 7)
            })
        );
    }

    #[test]
    fn test_completion_review_lands_on_target_in_generated_calendar() {
        let frame = frame(date(3, 7));
        let catalog = catalog();
        let planner = Planner::default();
        let mut sessions = stored(
            &planner
                .generate(&frame, &catalog, &[], &no_progress())
                .unwrap()
                .sessions,
        );

        // The first cycle only studies biology; Optics has nothing on the 7th
        let optics = catalog.topics()[2].id;
        assert!(
            !sessions
                .iter()
                .any(|s| s.date == date(1, 7) && s.topic.topic_id() == optics)
        );
        let session = completed_study(TopicRef::Plain(optics), date(1, 6));
        sessions.push(session.clone());

        let completion = planner.complete(
            &frame,
            "Optics",
            &session,
            &TopicProgress::default(),
            recall(5, date(1, 6)),
            &sessions,
        );
        let (review, trimmed) = new_review(completion.review);
        assert_eq!(review.date, date(1, 7));

        if let Some(trim) = trimmed {
            let shortened = sessions.iter_mut().find(|s| s.id == trim.session_id).unwrap();
            assert_eq!(shortened.date, date(1, 7));
            assert!(trim.minutes >= planner.config().limits.min_minutes());
            shortened.minutes = trim.minutes;
        }
        sessions.extend(stored(&[review]));
        assert_within_capacity(&frame, &sessions);
    }

    #[test]
    fn test_rebalance_carries_pending_repetition_review_over() {
        let frame = frame(date(3, 7));
        let catalog = catalog();
        let planner = Planner::default();
        let mut sessions = stored(
            &planner
                .generate(&frame, &catalog, &[], &no_progress())
                .unwrap()
                .sessions,
        );

        let first = sessions.iter().position(|s| s.date == date(1, 6)).unwrap();
        sessions[first].status = SessionStatus::Completed;
        let unit = sessions[first].topic.clone();
        let stats = TopicProgress::default().record_review(Quality::new(5).unwrap(), 1.0, date(1, 6));
        let progress = ProgressByTopic::from([(unit.topic_id(), stats)]);

        let mut review = pending(unit.clone(), date(1, 9), 30, SessionRole::Review);
        review.origin = SessionOrigin::Repetition;
        sessions.push(review.clone());

        let cutoff = date(1, 7);
        let calendar = planner
            .rebalance(&frame, &catalog, &sessions, &progress, cutoff)
            .unwrap();
        assert!(calendar.replaced.contains(&review.id));

        let carried: Vec<_> = calendar
            .sessions
            .iter()
            .filter(|d| d.origin == SessionOrigin::Repetition)
            .collect();
        assert_eq!(carried.len(), 1);
        // Due the day after the review, which is also the cut-off
        assert_eq!(carried[0].date, date(1, 7));
        assert_eq!(carried[0].topic, unit);
        assert_eq!(carried[0].review_stage, Some(1));
        assert_eq!(carried[0].minutes, 30);

        let mut after: Vec<SessionRecord> = sessions
            .iter()
            .filter(|s| !calendar.replaced.contains(&s.id))
            .cloned()
            .collect();
        after.extend(stored(&calendar.sessions));
        assert_within_capacity(&frame, &after);

        let again = planner
            .rebalance(&frame, &catalog, &after, &progress, cutoff)
            .unwrap();
        let fingerprints = |drafts: &[SessionDraft]| {
            let mut f: Vec<_> = drafts
                .iter()
                .map(|d| (d.origin == SessionOrigin::Repetition, d.fingerprint()))
                .collect();
            f.sort();
            f
        };
        assert_eq!(fingerprints(&calendar.sessions), fingerprints(&again.sessions));
    }

    #[test]
    fn test_open_repetition_review_before_cutoff_is_not_duplicated() {
        let frame = frame(date(3, 7));
        let catalog = catalog();
        let unit = TopicRef::Plain(catalog.topics()[1].id);
        let stats = TopicProgress::default().record_review(Quality::new(4).unwrap(), 1.0, date(1, 6));
        let mut review = pending(unit.clone(), date(1, 7), 30, SessionRole::Review);
        review.origin = SessionOrigin::Repetition;
        let sessions = vec![completed_study(unit.clone(), date(1, 6)), review];

        let calendar = Planner::default()
            .rebalance(
                &frame,
                &catalog,
                &sessions,
                &ProgressByTopic::from([(unit.topic_id(), stats)]),
                date(1, 8),
            )
            .unwrap();

        assert!(calendar.replaced.is_empty());
        assert!(
            calendar
                .sessions
                .iter()
                .all(|d| d.origin == SessionOrigin::Rotation)
        );
    }

    #[test]
    fn test_rebalance_at_exam_of_finished_plan_is_empty() {
        // Saturday exam: the cut-off day itself has no capacity
        let frame = frame(date(3, 8));
        let catalog = catalog();
        let planner = Planner::default();
        let mut sessions = stored(
            &planner
                .generate(&frame, &catalog, &[], &no_progress())
                .unwrap()
                .sessions,
        );
        for s in &mut sessions {
            s.status = SessionStatus::Completed;
            s.completed_minutes = Some(24 * 60);
        }

        for cutoff in [date(3, 8), date(3, 20)] {
            let calendar = planner
                .rebalance(&frame, &catalog, &sessions, &no_progress(), cutoff)
                .unwrap();
            assert!(calendar.sessions.is_empty());
            assert!(calendar.replaced.is_empty());
            assert_eq!(calendar.report.required_hours, 0.0);
        }
    }

    #[test]
    fn test_calendar_reports_full_estimate() {
        let calendar = Planner::default()
            .generate(&frame(date(3, 7)), &catalog(), &[], &no_progress())
            .unwrap();
        // Two medium topics at 16.25h and one high at 17h
        assert_eq!(calendar.estimated_hours, 49.5);
    }

    #[test]
    fn test_skipped_session_is_copied_forward() {
        let frame = frame(date(3, 7));
        let topic_ref = TopicRef::Plain(Uuid::new_v4());
        let mut skipped = stored(&[SessionDraft {
            topic: topic_ref,
            date: date(1, 10),
            minutes: 90,
            role: SessionRole::Test,
            origin: SessionOrigin::Rotation,
            review_stage: Some(4),
            note: String::new(),
        }])
        .remove(0);
        skipped.status = SessionStatus::Skipped;
        let ledger = PlanLedger::from_sessions([&skipped]);

        let copy = Planner::default()
            .reschedule_skipped(&frame, "Optics", &skipped, &ledger, date(1, 10))
            .expect("a make-up day exists");

        // Friday skipped: the weekend has no capacity
        assert_eq!(copy.date, date(1, 13));
        assert_eq!(copy.role, SessionRole::Test);
        assert_eq!(copy.review_stage, Some(4));
        assert_eq!(copy.minutes, 90);
        assert_eq!(copy.note, "Test: Optics");
    }

    #[test]
    fn test_frame_rejects_exam_not_after_start() {
        assert!(PlanFrame::new(date(1, 6), date(1, 6), weekdays(2.0)).is_err());
    }
}
