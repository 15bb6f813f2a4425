use super::common::*;
use crate::collaboration::domain::{awaiting, status, CollaborationPatch, CollaborationView};
use crate::collaboration::{
    CollaborationService, InMemoryCollaborationStore, NotificationError, ReminderConfig,
    ReminderRunStats, ReminderScheduler,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 14, 12, 0, 0).unwrap()
}

fn scheduler<S>(
    store: Arc<S>,
    gateway: &RecordingGateway,
) -> ReminderScheduler<S, RecordingGateway>
where
    S: crate::collaboration::CollaborationStore + 'static,
{
    ReminderScheduler::new(
        store,
        Arc::new(gateway.clone()),
        ReminderConfig::default(),
        Duration::from_secs(5),
    )
}

fn collaboration_due(
    service: &CollaborationService<InMemoryCollaborationStore, RecordingGateway>,
    seed: &Seed,
    due: NaiveDate,
    status_value: &str,
    awaiting_from: &str,
) -> CollaborationView {
    let mut input = recommendation_input(seed);
    input.next_action_due_date = Some(due);
    let created = service.create(seed.owner(), input).expect("create succeeds");
    service
        .update(
            created.id(),
            seed.owner(),
            CollaborationPatch {
                status: Some(status_value.to_string()),
                awaiting_action_from: Some(Some(awaiting_from.to_string())),
                ..Default::default()
            },
        )
        .expect("update succeeds")
}

#[tokio::test]
async fn application_sweep_reminds_matching_offsets_only() {
    let seed = seed();
    let owner = seed.owner();
    let tomorrow = seed
        .store
        .add_application(owner, "Tomorrow Fund", "In Progress", Some(date(2024, 12, 15)));
    let in_three = seed
        .store
        .add_application(owner, "Three Day Award", "Planning", Some(date(2024, 12, 17)));
    let overdue = seed
        .store
        .add_application(owner, "Missed Grant", "In Progress", Some(date(2024, 12, 13)));
    seed.store
        .add_application(owner, "Done Fund", "Submitted", Some(date(2024, 12, 15)));
    seed.store
        .add_application(owner, "Won Fund", "awarded", Some(date(2024, 12, 17)));
    seed.store
        .add_application(owner, "Far Fund", "In Progress", Some(date(2025, 1, 30)));

    let gateway = RecordingGateway::default();
    let stats = scheduler(seed.store.clone(), &gateway)
        .sweep_applications(now())
        .await;

    // Gates Scholarship (due in 6 days) is processed but not reminded.
    assert_eq!(
        stats,
        ReminderRunStats {
            applications_reminded: 3,
            collaborations_reminded: 0,
            errors: 0,
            total_processed: 4,
        }
    );

    let sent = gateway.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|message| message.to == seed.student.email));
    assert!(sent
        .iter()
        .any(|message| message.subject == "Tomorrow Fund is due in 1 day"));
    assert!(sent
        .iter()
        .any(|message| message.subject == "Missed Grant was due 1 day ago"));

    for id in [tomorrow.id, in_three.id, overdue.id] {
        let row = seed.store.application_row(id).expect("application");
        assert_eq!(row.last_reminder_sent_at, Some(now()));
    }
    let untouched = seed
        .store
        .application_row(seed.application.id)
        .expect("application");
    assert!(untouched.last_reminder_sent_at.is_none());
}

#[tokio::test]
async fn second_run_on_the_same_day_sends_nothing() {
    let seed = seed();
    seed.store.add_application(
        seed.owner(),
        "Tomorrow Fund",
        "In Progress",
        Some(date(2024, 12, 15)),
    );

    let gateway = RecordingGateway::default();
    let scheduler = scheduler(seed.store.clone(), &gateway);
    let first = scheduler.run(now()).await;
    let second = scheduler.run(now() + chrono::Duration::minutes(30)).await;

    assert_eq!(first.applications_reminded, 1);
    assert_eq!(second.applications_reminded, 0);
    assert_eq!(second.errors, 0);
    assert_eq!(gateway.sent().len(), 1);
}

#[tokio::test]
async fn collaboration_sweep_targets_whoever_must_act() {
    let (service, seed, _) = build_service();
    let waiting_on_collaborator = collaboration_due(
        &service,
        &seed,
        date(2024, 12, 15),
        status::INVITED,
        awaiting::COLLABORATOR,
    );
    let waiting_on_student = collaboration_due(
        &service,
        &seed,
        date(2024, 12, 11),
        status::IN_PROGRESS,
        awaiting::STUDENT,
    );
    collaboration_due(
        &service,
        &seed,
        date(2024, 12, 15),
        status::COMPLETED,
        awaiting::STUDENT,
    );
    collaboration_due(
        &service,
        &seed,
        date(2024, 12, 15),
        status::PENDING,
        awaiting::STUDENT,
    );

    let gateway = RecordingGateway::default();
    let stats = scheduler(seed.store.clone(), &gateway)
        .sweep_collaborations(now())
        .await;

    assert_eq!(stats.collaborations_reminded, 2);
    assert_eq!(stats.total_processed, 2);
    assert_eq!(stats.errors, 0);

    let sent = gateway.sent();
    assert!(sent
        .iter()
        .any(|message| message.to == seed.collaborator.email
            && message.subject == "Reminder: Submit letter due in 1 day"));
    assert!(sent
        .iter()
        .any(|message| message.to == seed.student.email && message.subject == "Overdue: Submit letter"));

    for view in [waiting_on_collaborator, waiting_on_student] {
        let row = seed
            .store
            .collaboration_row(view.id())
            .expect("collaboration");
        assert_eq!(row.last_reminder_sent_at, Some(now()));
    }
}

#[tokio::test]
async fn gateway_failures_are_counted_and_do_not_stop_the_sweep() {
    let seed = seed();
    seed.store.add_application(
        seed.owner(),
        "Tomorrow Fund",
        "In Progress",
        Some(date(2024, 12, 15)),
    );
    let overdue = seed.store.add_application(
        seed.owner(),
        "Missed Grant",
        "In Progress",
        Some(date(2024, 12, 11)),
    );

    let gateway = RecordingGateway::failing(NotificationError::Timeout(Duration::from_secs(5)));
    let stats = scheduler(seed.store.clone(), &gateway).run(now()).await;

    assert_eq!(stats.applications_reminded, 0);
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.total_processed, 3);
    let row = seed.store.application_row(overdue.id).expect("application");
    assert!(row.last_reminder_sent_at.is_none(), "failed sends are retried next run");
}

#[tokio::test]
async fn a_failing_query_does_not_block_the_other_sweep() {
    let (service, seed, _) = build_service();
    collaboration_due(
        &service,
        &seed,
        date(2024, 12, 15),
        status::ACCEPTED,
        awaiting::COLLABORATOR,
    );
    let store = FaultyStore {
        fail_queries: true,
        ..FaultyStore::wrapping((*seed.store).clone())
    };

    let gateway = RecordingGateway::default();
    let stats = scheduler(Arc::new(store), &gateway).run(now()).await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.collaborations_reminded, 1);
    assert_eq!(gateway.sent().len(), 1);
}
