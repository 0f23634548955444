//! Make-up search for skipped sessions.

use chrono::{Days, NaiveDate};

use crate::{capacity::WeeklyCapacity, ledger::PlanLedger, session::SessionRecord};

/// A day already holding this many sessions of a topic takes no make-up session for it.
pub const MAX_TOPIC_SESSIONS_PER_DAY: u32 = 2;

/// First date after the skipped one (and after today) that can take the session again.
///
/// Walks forward day by day up to the day before the exam, skipping rest days,
/// days that already hold [`MAX_TOPIC_SESSIONS_PER_DAY`] sessions of the topic
/// and days without enough spare capacity for the session's full length.
/// `ledger` must no longer count the skipped session.
pub fn find_make_up_date(
    ledger: &PlanLedger,
    capacity: &WeeklyCapacity,
    skipped: &SessionRecord,
    today: NaiveDate,
    exam: NaiveDate,
) -> Option<NaiveDate> {
    let last = exam.checked_sub_days(Days::new(1))?;
    let first = skipped.date.max(today).succ_opt()?;
    let topic_id = skipped.topic.topic_id();

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .find(|date| {
            capacity.minutes_on(*date) > 0
                && ledger.topic_sessions_on(*date, topic_id) < MAX_TOPIC_SESSIONS_PER_DAY
                && ledger.spare_minutes(capacity, *date) >= skipped.minutes
        })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        capacity::tests::weekdays,
        session::{SessionRole, SessionStatus, tests::record},
        topic::TopicRef,
    };

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_skips_rest_days_and_crowded_days() {
        let topic = TopicRef::Plain(Uuid::new_v4());
        let capacity = weekdays(3.0);
        let skipped = record(topic.clone(), date(9), 60, SessionStatus::Skipped, SessionRole::Study, Some(1));

        let sessions = vec![
            skipped.clone(),
            // Friday the 10th already has two sessions of the topic
            record(topic.clone(), date(10), 30, SessionStatus::Pending, SessionRole::Review, Some(2)),
            record(topic.clone(), date(10), 30, SessionStatus::Completed, SessionRole::Review, Some(3)),
        ];
        let ledger = PlanLedger::from_sessions(&sessions);

        // Saturday and Sunday are rest days
        let found = find_make_up_date(&ledger, &capacity, &skipped, date(6), date(31));
        assert_eq!(found, Some(date(13)));
    }

    #[test]
    fn test_requires_spare_capacity() {
        let topic = TopicRef::Plain(Uuid::new_v4());
        let capacity = weekdays(1.0);
        let skipped = record(topic, date(6), 60, SessionStatus::Skipped, SessionRole::Study, Some(1));
        let sessions = vec![record(
            TopicRef::Plain(Uuid::new_v4()),
            date(7),
            30,
            SessionStatus::Pending,
            SessionRole::Study,
            Some(1),
        )];
        let ledger = PlanLedger::from_sessions(&sessions);

        let found = find_make_up_date(&ledger, &capacity, &skipped, date(6), date(31));
        assert_eq!(found, Some(date(8)));
    }

    #[test]
    fn test_search_starts_after_today_and_stops_before_exam() {
        let topic = TopicRef::Plain(Uuid::new_v4());
        let capacity = weekdays(1.0);
        let skipped = record(topic, date(6), 60, SessionStatus::Skipped, SessionRole::Study, Some(1));
        let ledger = PlanLedger::default();

        // Skipped long ago: search starts the day after today
        assert_eq!(
            find_make_up_date(&ledger, &capacity, &skipped, date(8), date(31)),
            Some(date(9))
        );
        // Exam on the 8th leaves only the 7th
        assert_eq!(
            find_make_up_date(&ledger, &capacity, &skipped, date(6), date(8)),
            Some(date(7))
        );
        assert_eq!(
            find_make_up_date(&ledger, &capacity, &skipped, date(6), date(7)),
            None
        );
    }
}
