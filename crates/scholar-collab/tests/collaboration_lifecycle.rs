use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use scholar_collab::collaboration::{
    CollaborationPatch, CollaborationService, CollaborationType, DeliveryStatus, EmailMessage,
    InMemoryCollaborationStore, NewCollaboration, NotificationError, NotificationGateway,
    ReminderConfig, ReminderScheduler, WorkflowSettings,
};

#[derive(Default, Clone)]
struct Outbox {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl Outbox {
    fn subjects(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("outbox mutex poisoned")
            .iter()
            .map(|message| message.subject.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for Outbox {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        let mut messages = self.messages.lock().expect("outbox mutex poisoned");
        messages.push(message.clone());
        Ok(format!("outbox-{}", messages.len()))
    }
}

#[tokio::test]
async fn recommendation_moves_from_request_to_reminder() {
    let store = Arc::new(InMemoryCollaborationStore::default());
    let student = store.add_student("ada@example.edu", "Ada");
    let collaborator = store.add_collaborator(
        student.user_id,
        "Grace",
        "Hopper",
        "grace@example.edu",
        Some("Counselor"),
    );
    let due = NaiveDate::from_ymd_opt(2024, 12, 15).expect("valid date");
    let application =
        store.add_application(student.user_id, "Gates Scholarship", "In Progress", Some(due));

    let outbox = Outbox::default();
    let gateway = Arc::new(outbox.clone());
    let service = CollaborationService::new(store.clone(), gateway.clone(), WorkflowSettings::default());

    let mut input = NewCollaboration::new(
        collaborator.id,
        application.id,
        CollaborationType::Recommendation,
    );
    input.next_action_due_date = Some(due);
    input.next_action_description = Some("Upload letter".to_string());
    let created = service
        .create(student.user_id, input)
        .expect("collaboration created");

    let invite = service
        .send_invitation(created.id(), student.user_id)
        .await
        .expect("invitation sent");
    assert_eq!(invite.delivery_status, DeliveryStatus::Sent);

    let accepted = service
        .update(
            created.id(),
            student.user_id,
            CollaborationPatch {
                status: Some("accepted".to_string()),
                ..Default::default()
            },
        )
        .expect("accepted");
    assert_eq!(accepted.status(), "accepted");

    let actions: Vec<String> = service
        .history(created.id(), student.user_id)
        .expect("history")
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions, vec!["accepted", "invited", "created"]);

    let scheduler = ReminderScheduler::new(
        store.clone(),
        gateway,
        ReminderConfig::default(),
        Duration::from_secs(5),
    );
    let now = Utc.with_ymd_and_hms(2024, 12, 12, 9, 0, 0).unwrap();
    let stats = scheduler.run(now).await;

    assert_eq!(stats.applications_reminded, 1);
    assert_eq!(stats.collaborations_reminded, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.total_processed, 2);

    let subjects = outbox.subjects();
    assert_eq!(subjects.len(), 3, "invitation plus two reminders");
    assert!(subjects.contains(&"Gates Scholarship is due in 3 days".to_string()));
    assert!(subjects.contains(&"Reminder: Upload letter due in 3 days".to_string()));

    let repeat = scheduler.run(now + chrono::Duration::hours(2)).await;
    assert_eq!(repeat.applications_reminded + repeat.collaborations_reminded, 0);

    service
        .delete(created.id(), student.user_id)
        .expect("deleted");
    assert!(service.get(created.id(), student.user_id).is_err());
}
