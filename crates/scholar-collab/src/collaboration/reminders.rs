//! Deadline reminder sweeps.
//!
//! Two independent passes, one over applications and one over collaborations. Each pass queries
//! the due-date window implied by its schedule, drops items in states that no longer need
//! nudging, and sends at most one reminder per item when the calendar-day distance to the due
//! date matches a configured offset. `last_reminder_sent_at` is stamped after every successful
//! send so a second run on the same day stays quiet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{awaiting, status};
use super::notify::{send_with_timeout, EmailMessage, NotificationError, NotificationGateway};
use super::repository::{
    ApplicationReminderCandidate, CollaborationReminderCandidate, CollaborationStore,
};
use super::templates;

/// Minimum spacing between two reminders for the same item.
pub const DEDUP_WINDOW_HOURS: i64 = 24;

const TERMINAL_APPLICATION_STATUSES: [&str; 3] = ["submitted", "awarded", "not awarded"];
const REMINDABLE_COLLABORATION_STATUSES: [&str; 3] =
    [status::INVITED, status::ACCEPTED, status::IN_PROGRESS];

/// Day offsets at which one kind of item is reminded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSchedule {
    /// Days before the due date.
    pub lead_days: Vec<u32>,
    /// Days after the due date.
    pub overdue_days: Vec<u32>,
}

impl ReminderSchedule {
    /// Inclusive due-date range worth querying on `today`.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let max_overdue = self.overdue_days.iter().copied().max().unwrap_or(0);
        let max_lead = self.lead_days.iter().copied().max().unwrap_or(0);
        let from = today
            .checked_sub_days(Days::new(u64::from(max_overdue)))
            .unwrap_or(NaiveDate::MIN);
        let to = today
            .checked_add_days(Days::new(u64::from(max_lead)))
            .unwrap_or(NaiveDate::MAX);
        (from, to)
    }

    /// Lead offsets apply on or before the due date, overdue offsets after it.
    pub fn intervals_for(&self, day_diff: i64) -> &[u32] {
        if day_diff >= 0 {
            &self.lead_days
        } else {
            &self.overdue_days
        }
    }
}

/// Schedules for both sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    pub applications: ReminderSchedule,
    pub collaborations: ReminderSchedule,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            applications: ReminderSchedule {
                lead_days: vec![7, 3, 1],
                overdue_days: vec![1, 3, 7],
            },
            collaborations: ReminderSchedule {
                lead_days: vec![7, 3, 1],
                overdue_days: vec![1, 3],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

impl ReminderKind {
    fn from_day_diff(day_diff: i64) -> Self {
        if day_diff >= 0 {
            Self::DueSoon
        } else {
            Self::Overdue
        }
    }
}

/// Aggregate outcome of one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRunStats {
    pub applications_reminded: u32,
    pub collaborations_reminded: u32,
    pub errors: u32,
    pub total_processed: u32,
}

impl ReminderRunStats {
    fn absorb(&mut self, other: ReminderRunStats) {
        self.applications_reminded += other.applications_reminded;
        self.collaborations_reminded += other.collaborations_reminded;
        self.errors += other.errors;
        self.total_processed += other.total_processed;
    }
}

/// Whole calendar days from `today` to `due`; negative once the due date has passed.
pub fn day_diff(due: NaiveDate, today: NaiveDate) -> i64 {
    due.signed_duration_since(today).num_days()
}

/// Decide whether an item due on `due` should be reminded at `now`.
///
/// The distance must land exactly on one of `intervals`, and an earlier reminder must be at
/// least [`DEDUP_WINDOW_HOURS`] old.
pub fn should_remind(
    due: NaiveDate,
    now: DateTime<Utc>,
    last_sent: Option<DateTime<Utc>>,
    intervals: &[u32],
) -> bool {
    let distance = day_diff(due, now.date_naive()).unsigned_abs();
    if !intervals.iter().any(|offset| u64::from(*offset) == distance) {
        return false;
    }

    match last_sent {
        None => true,
        Some(sent) => {
            now.signed_duration_since(sent) >= chrono::Duration::hours(DEDUP_WINDOW_HOURS)
        }
    }
}

fn application_is_open(status: &str) -> bool {
    let normalized = status.trim().to_ascii_lowercase();
    !TERMINAL_APPLICATION_STATUSES.contains(&normalized.as_str())
}

fn collaboration_is_active(status: &str) -> bool {
    REMINDABLE_COLLABORATION_STATUSES.contains(&status.trim())
}

/// Runs the reminder sweeps against a store and a notification gateway.
pub struct ReminderScheduler<R, N> {
    store: Arc<R>,
    gateway: Arc<N>,
    config: ReminderConfig,
    timeout: Duration,
}

impl<R, N> ReminderScheduler<R, N>
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(store: Arc<R>, gateway: Arc<N>, config: ReminderConfig, timeout: Duration) -> Self {
        Self {
            store,
            gateway,
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Run both sweeps and add up their counts. A failing sweep never stops the other one.
    pub async fn run(&self, now: DateTime<Utc>) -> ReminderRunStats {
        let mut stats = self.sweep_applications(now).await;
        stats.absorb(self.sweep_collaborations(now).await);
        info!(
            applications = stats.applications_reminded,
            collaborations = stats.collaborations_reminded,
            errors = stats.errors,
            processed = stats.total_processed,
            "reminder run finished"
        );
        stats
    }

    pub async fn sweep_applications(&self, now: DateTime<Utc>) -> ReminderRunStats {
        let mut stats = ReminderRunStats::default();
        let schedule = &self.config.applications;
        let today = now.date_naive();
        let (from, to) = schedule.window(today);

        let candidates = match self.store.applications_due_between(from, to) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "application reminder query failed");
                stats.errors += 1;
                return stats;
            }
        };

        for candidate in candidates
            .iter()
            .filter(|candidate| application_is_open(&candidate.application.status))
        {
            stats.total_processed += 1;
            let Some(due) = candidate.application.due_date else {
                continue;
            };
            let diff = day_diff(due, today);
            if !should_remind(
                due,
                now,
                candidate.application.last_reminder_sent_at,
                schedule.intervals_for(diff),
            ) {
                continue;
            }

            let message = application_message(candidate, due, diff);
            match self.deliver(&message).await {
                Ok(()) => {
                    stats.applications_reminded += 1;
                    if let Err(err) = self
                        .store
                        .mark_application_reminded(candidate.application.id, now)
                    {
                        warn!(
                            application_id = %candidate.application.id,
                            error = %err,
                            "failed to record application reminder"
                        );
                        stats.errors += 1;
                    }
                }
                Err(err) => {
                    warn!(
                        application_id = %candidate.application.id,
                        error = %err,
                        "application reminder failed"
                    );
                    stats.errors += 1;
                }
            }
        }

        stats
    }

    pub async fn sweep_collaborations(&self, now: DateTime<Utc>) -> ReminderRunStats {
        let mut stats = ReminderRunStats::default();
        let schedule = &self.config.collaborations;
        let today = now.date_naive();
        let (from, to) = schedule.window(today);

        let candidates = match self.store.collaborations_due_between(from, to) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "collaboration reminder query failed");
                stats.errors += 1;
                return stats;
            }
        };

        for candidate in candidates
            .iter()
            .filter(|candidate| collaboration_is_active(&candidate.collaboration.status))
        {
            stats.total_processed += 1;
            let Some(due) = candidate.collaboration.next_action_due_date else {
                continue;
            };
            let diff = day_diff(due, today);
            if !should_remind(
                due,
                now,
                candidate.collaboration.last_reminder_sent_at,
                schedule.intervals_for(diff),
            ) {
                continue;
            }

            let message = collaboration_message(candidate, due, diff);
            match self.deliver(&message).await {
                Ok(()) => {
                    stats.collaborations_reminded += 1;
                    if let Err(err) = self
                        .store
                        .mark_collaboration_reminded(candidate.collaboration.id, now)
                    {
                        warn!(
                            collaboration_id = %candidate.collaboration.id,
                            error = %err,
                            "failed to record collaboration reminder"
                        );
                        stats.errors += 1;
                    }
                }
                Err(err) => {
                    warn!(
                        collaboration_id = %candidate.collaboration.id,
                        error = %err,
                        "collaboration reminder failed"
                    );
                    stats.errors += 1;
                }
            }
        }

        stats
    }

    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let message_id = send_with_timeout(self.gateway.as_ref(), message, self.timeout).await?;
        debug!(to = %message.to, message_id = %message_id, "reminder sent");
        Ok(())
    }
}

fn application_message(
    candidate: &ApplicationReminderCandidate,
    due: NaiveDate,
    diff: i64,
) -> EmailMessage {
    templates::application_reminder(
        candidate,
        due,
        ReminderKind::from_day_diff(diff),
        days(diff),
    )
}

/// The collaborator is nudged while the ball is in their court; otherwise the student is.
fn collaboration_message(
    candidate: &CollaborationReminderCandidate,
    due: NaiveDate,
    diff: i64,
) -> EmailMessage {
    let awaiting_collaborator = candidate.collaboration.awaiting_action_from.as_deref()
        == Some(awaiting::COLLABORATOR);
    let (recipient, greeting) = if awaiting_collaborator {
        (
            candidate.collaborator.email.as_str(),
            candidate.collaborator.first_name.as_str(),
        )
    } else {
        (
            candidate.student.email.as_str(),
            candidate.student.first_name.as_str(),
        )
    };

    templates::collaboration_reminder(
        candidate,
        recipient,
        greeting,
        due,
        ReminderKind::from_day_diff(diff),
        days(diff),
    )
}

fn days(diff: i64) -> u32 {
    u32::try_from(diff.unsigned_abs()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn reminds_when_offset_matches_and_nothing_was_sent() {
        let now = noon(2024, 12, 14);
        assert!(should_remind(date(2024, 12, 15), now, None, &[7, 3, 1]));
    }

    #[test]
    fn second_call_in_the_same_minute_is_suppressed() {
        let now = noon(2024, 12, 14);
        assert!(!should_remind(date(2024, 12, 15), now, Some(now), &[7, 3, 1]));
    }

    #[test]
    fn offsets_outside_the_list_are_ignored() {
        let now = noon(2024, 12, 5);
        assert!(!should_remind(date(2024, 12, 15), now, None, &[7, 3, 1]));
    }

    #[test]
    fn dedup_window_reopens_after_twenty_four_hours() {
        let now = noon(2024, 12, 14);
        let yesterday = noon(2024, 12, 13);
        let almost = yesterday + chrono::Duration::minutes(1);
        assert!(should_remind(date(2024, 12, 15), now, Some(yesterday), &[1]));
        assert!(!should_remind(date(2024, 12, 15), now, Some(almost), &[1]));
    }

    #[test]
    fn day_diff_uses_calendar_dates() {
        let late_evening = Utc.with_ymd_and_hms(2024, 12, 14, 23, 59, 0).unwrap();
        assert_eq!(day_diff(date(2024, 12, 15), late_evening.date_naive()), 1);
        assert_eq!(day_diff(date(2024, 12, 12), date(2024, 12, 15)), -3);
    }

    #[test]
    fn overdue_offsets_use_absolute_distance() {
        let now = noon(2024, 12, 18);
        assert!(should_remind(date(2024, 12, 15), now, None, &[1, 3]));
        assert!(!should_remind(date(2024, 12, 15), now, None, &[1]));
    }

    #[test]
    fn window_spans_largest_offsets() {
        let schedule = ReminderConfig::default().applications;
        assert_eq!(
            schedule.window(date(2024, 12, 10)),
            (date(2024, 12, 3), date(2024, 12, 17))
        );
        assert_eq!(schedule.intervals_for(0), &[7, 3, 1]);
        assert_eq!(schedule.intervals_for(-1), &[1, 3, 7]);
    }

    #[test]
    fn terminal_statuses_are_matched_case_insensitively() {
        assert!(!application_is_open("Not Awarded"));
        assert!(!application_is_open("SUBMITTED"));
        assert!(application_is_open("In Progress"));
        assert!(collaboration_is_active("in_progress"));
        assert!(!collaboration_is_active("pending"));
        assert!(!collaboration_is_active("completed"));
    }
}
