use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use scholar_collab::collaboration::dates::normalize_date;
use scholar_collab::collaboration::{
    ApplicationSummary, CollaboratorSummary, EmailGateway, EmailMessage,
    InMemoryCollaborationStore, NotificationError, NotificationGateway, ReminderScheduler,
    StudentContact,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

pub(crate) type SharedScheduler = Arc<ReminderScheduler<InMemoryCollaborationStore, EmailGateway>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) reminders: SharedScheduler,
    pub(crate) cron_secret: Option<String>,
}

/// Demo gateway: keeps every message and logs the envelope instead of delivering it.
#[derive(Default, Clone)]
pub(crate) struct OutboxGateway {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl OutboxGateway {
    pub(crate) fn messages(&self) -> Vec<EmailMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationGateway for OutboxGateway {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        let mut guard = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(message.clone());
        let id = format!("outbox-{}", guard.len());
        info!(to = %message.to, subject = %message.subject, message_id = %id, "captured e-mail");
        Ok(id)
    }
}

/// Directory rows the demo and development server start with.
pub(crate) struct DemoDirectory {
    pub(crate) student: StudentContact,
    pub(crate) collaborator: CollaboratorSummary,
    pub(crate) application: ApplicationSummary,
}

pub(crate) fn seed_demo_directory(
    store: &InMemoryCollaborationStore,
    due_date: NaiveDate,
) -> DemoDirectory {
    let student = store.add_student("ada.student@example.edu", "Ada");
    let collaborator = store.add_collaborator(
        student.user_id,
        "Grace",
        "Hopper",
        "grace.hopper@example.edu",
        Some("Computer science teacher"),
    );
    let application = store.add_application(
        student.user_id,
        "Future Engineers Scholarship",
        "In Progress",
        Some(due_date),
    );
    DemoDirectory {
        student,
        collaborator,
        application,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    normalize_date(raw)
}
