use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::collaboration::domain::{
    ApplicationId, ApplicationSummary, BaseChanges, Collaboration, CollaborationDetails,
    CollaborationDraft, CollaborationId, CollaborationInvite, CollaborationType, CollaborationView,
    CollaboratorId, CollaboratorSummary, HistoryEntry, NewCollaboration, NewHistoryEntry,
    NewInvite, StudentContact, UserId,
};
use crate::collaboration::notify::{EmailMessage, NotificationError, NotificationGateway};
use crate::collaboration::repository::{
    ApplicationReminderCandidate, CollaborationReminderCandidate, CollaborationRepository,
    DirectoryReader, HistoryRepository, InviteRepository, ReminderSource, RepositoryError,
};
use crate::collaboration::{
    collaboration_router, CollaborationService, InMemoryCollaborationStore, WorkflowSettings,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn settings() -> WorkflowSettings {
    WorkflowSettings {
        app_base_url: "https://scholar.example.edu/".to_string(),
        ..WorkflowSettings::default()
    }
}

/// Gateway that records every message and can be told to fail.
#[derive(Default, Clone)]
pub(super) struct RecordingGateway {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failure: Arc<Mutex<Option<NotificationError>>>,
}

impl RecordingGateway {
    pub(super) fn failing(error: NotificationError) -> Self {
        let gateway = Self::default();
        gateway.fail_with(Some(error));
        gateway
    }

    pub(super) fn fail_with(&self, error: Option<NotificationError>) {
        *self.failure.lock().expect("gateway mutex poisoned") = error;
    }

    pub(super) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("gateway mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        if let Some(error) = self.failure.lock().expect("gateway mutex poisoned").clone() {
            return Err(error);
        }
        let mut sent = self.sent.lock().expect("gateway mutex poisoned");
        sent.push(message.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}

/// Seeded store plus the ids a test usually needs.
pub(super) struct Seed {
    pub(super) store: Arc<InMemoryCollaborationStore>,
    pub(super) student: StudentContact,
    pub(super) collaborator: CollaboratorSummary,
    pub(super) application: ApplicationSummary,
}

impl Seed {
    pub(super) fn owner(&self) -> UserId {
        self.student.user_id
    }
}

pub(super) fn seed() -> Seed {
    let store = Arc::new(InMemoryCollaborationStore::default());
    let student = store.add_student("ada@example.edu", "Ada");
    let collaborator = store.add_collaborator(
        student.user_id,
        "Grace",
        "Hopper",
        "grace@example.edu",
        Some("Teacher"),
    );
    let application = store.add_application(
        student.user_id,
        "Gates Scholarship",
        "In Progress",
        Some(date(2024, 12, 20)),
    );
    Seed {
        store,
        student,
        collaborator,
        application,
    }
}

pub(super) fn build_service() -> (
    CollaborationService<InMemoryCollaborationStore, RecordingGateway>,
    Seed,
    RecordingGateway,
) {
    let seed = seed();
    let gateway = RecordingGateway::default();
    let service =
        CollaborationService::new(seed.store.clone(), Arc::new(gateway.clone()), settings());
    (service, seed, gateway)
}

pub(super) fn recommendation_input(seed: &Seed) -> NewCollaboration {
    let mut input = NewCollaboration::new(
        seed.collaborator.id,
        seed.application.id,
        CollaborationType::Recommendation,
    );
    input.next_action_due_date = Some(date(2024, 12, 15));
    input.next_action_description = Some("Submit letter".to_string());
    input
}

pub(super) fn router_with_service(
    service: CollaborationService<InMemoryCollaborationStore, RecordingGateway>,
) -> axum::Router {
    collaboration_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// In-memory store with switchable faults on individual writes and the reminder queries.
#[derive(Default, Clone)]
pub(super) struct FaultyStore {
    pub(super) inner: InMemoryCollaborationStore,
    pub(super) fail_details: bool,
    pub(super) fail_base_update: bool,
    pub(super) fail_history: bool,
    pub(super) fail_queries: bool,
}

impl FaultyStore {
    pub(super) fn wrapping(inner: InMemoryCollaborationStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl CollaborationRepository for FaultyStore {
    fn insert_collaboration(
        &self,
        draft: CollaborationDraft,
    ) -> Result<Collaboration, RepositoryError> {
        self.inner.insert_collaboration(draft)
    }

    fn insert_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError> {
        if self.fail_details {
            return Err(offline());
        }
        self.inner.insert_details(id, details)
    }

    fn update_collaboration(
        &self,
        id: CollaborationId,
        changes: &BaseChanges,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.fail_base_update {
            return Err(offline());
        }
        self.inner.update_collaboration(id, changes, at)
    }

    fn update_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError> {
        self.inner.update_details(id, details)
    }

    fn delete_collaboration(&self, id: CollaborationId) -> Result<(), RepositoryError> {
        self.inner.delete_collaboration(id)
    }

    fn fetch_owned(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<Option<CollaborationView>, RepositoryError> {
        self.inner.fetch_owned(id, owner)
    }

    fn list_for_application(
        &self,
        application_id: ApplicationId,
        owner: UserId,
    ) -> Result<Vec<CollaborationView>, RepositoryError> {
        self.inner.list_for_application(application_id, owner)
    }
}

impl HistoryRepository for FaultyStore {
    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, RepositoryError> {
        if self.fail_history {
            return Err(offline());
        }
        self.inner.append_history(entry)
    }

    fn history_for(&self, id: CollaborationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.inner.history_for(id)
    }
}

impl InviteRepository for FaultyStore {
    fn insert_invite(&self, invite: NewInvite) -> Result<CollaborationInvite, RepositoryError> {
        self.inner.insert_invite(invite)
    }

    fn latest_invite(
        &self,
        id: CollaborationId,
    ) -> Result<Option<CollaborationInvite>, RepositoryError> {
        self.inner.latest_invite(id)
    }

    fn update_invite(&self, invite: &CollaborationInvite) -> Result<(), RepositoryError> {
        self.inner.update_invite(invite)
    }

    fn invites_for(
        &self,
        id: CollaborationId,
    ) -> Result<Vec<CollaborationInvite>, RepositoryError> {
        self.inner.invites_for(id)
    }
}

impl DirectoryReader for FaultyStore {
    fn collaborator(
        &self,
        id: CollaboratorId,
        owner: UserId,
    ) -> Result<Option<CollaboratorSummary>, RepositoryError> {
        self.inner.collaborator(id, owner)
    }

    fn application(
        &self,
        id: ApplicationId,
        owner: UserId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError> {
        self.inner.application(id, owner)
    }

    fn student(&self, id: UserId) -> Result<Option<StudentContact>, RepositoryError> {
        self.inner.student(id)
    }
}

impl ReminderSource for FaultyStore {
    fn applications_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ApplicationReminderCandidate>, RepositoryError> {
        if self.fail_queries {
            return Err(offline());
        }
        self.inner.applications_due_between(from, to)
    }

    fn collaborations_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CollaborationReminderCandidate>, RepositoryError> {
        self.inner.collaborations_due_between(from, to)
    }

    fn mark_application_reminded(
        &self,
        id: ApplicationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.mark_application_reminded(id, at)
    }

    fn mark_collaboration_reminded(
        &self,
        id: CollaborationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.mark_collaboration_reminded(id, at)
    }
}
