use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    ApplicationId, ApplicationSummary, BaseChanges, Collaboration, CollaborationDetails,
    CollaborationDraft, CollaborationId, CollaborationInvite, CollaborationView, CollaboratorId,
    CollaboratorSummary, HistoryEntry, NewHistoryEntry, NewInvite, StudentContact, UserId,
};

/// Base and extension persistence for collaborations.
///
/// Reads are ownership scoped: `fetch_owned` only returns a row when the collaborator it targets
/// belongs to `owner`. Deleting a collaboration removes its extension, invites, and history.
pub trait CollaborationRepository: Send + Sync {
    fn insert_collaboration(
        &self,
        draft: CollaborationDraft,
    ) -> Result<Collaboration, RepositoryError>;
    fn insert_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError>;
    /// Sets only the columns named in `changes` and stamps `updated_at`.
    fn update_collaboration(
        &self,
        id: CollaborationId,
        changes: &BaseChanges,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn update_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError>;
    fn delete_collaboration(&self, id: CollaborationId) -> Result<(), RepositoryError>;
    fn fetch_owned(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<Option<CollaborationView>, RepositoryError>;
    fn list_for_application(
        &self,
        application_id: ApplicationId,
        owner: UserId,
    ) -> Result<Vec<CollaborationView>, RepositoryError>;
}

/// Append-only audit trail.
pub trait HistoryRepository: Send + Sync {
    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, RepositoryError>;
    /// Newest first.
    fn history_for(&self, id: CollaborationId) -> Result<Vec<HistoryEntry>, RepositoryError>;
}

pub trait InviteRepository: Send + Sync {
    fn insert_invite(&self, invite: NewInvite) -> Result<CollaborationInvite, RepositoryError>;
    /// Most recently created invite for the collaboration, if any.
    fn latest_invite(
        &self,
        id: CollaborationId,
    ) -> Result<Option<CollaborationInvite>, RepositoryError>;
    fn update_invite(&self, invite: &CollaborationInvite) -> Result<(), RepositoryError>;
    fn invites_for(&self, id: CollaborationId)
        -> Result<Vec<CollaborationInvite>, RepositoryError>;
}

/// Read-only lookups into entities managed elsewhere, used for ownership checks and e-mail copy.
pub trait DirectoryReader: Send + Sync {
    fn collaborator(
        &self,
        id: CollaboratorId,
        owner: UserId,
    ) -> Result<Option<CollaboratorSummary>, RepositoryError>;
    fn application(
        &self,
        id: ApplicationId,
        owner: UserId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError>;
    fn student(&self, id: UserId) -> Result<Option<StudentContact>, RepositoryError>;
}

/// Application due for a reminder evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationReminderCandidate {
    pub application: ApplicationSummary,
    pub student: StudentContact,
}

/// Collaboration due for a reminder evaluation, joined with everyone the e-mail mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaborationReminderCandidate {
    pub collaboration: Collaboration,
    pub collaborator: CollaboratorSummary,
    pub application: ApplicationSummary,
    pub student: StudentContact,
}

/// Due-date window queries and dedup bookkeeping for the reminder sweep.
pub trait ReminderSource: Send + Sync {
    /// Applications whose due date falls within `[from, to]`, any status.
    fn applications_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ApplicationReminderCandidate>, RepositoryError>;
    /// Collaborations whose next action is due within `[from, to]`, any status.
    fn collaborations_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CollaborationReminderCandidate>, RepositoryError>;
    fn mark_application_reminded(
        &self,
        id: ApplicationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn mark_collaboration_reminded(
        &self,
        id: CollaborationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Everything the workflow engine needs from storage.
pub trait CollaborationStore:
    CollaborationRepository + HistoryRepository + InviteRepository + DirectoryReader + ReminderSource
{
}

impl<T> CollaborationStore for T where
    T: CollaborationRepository
        + HistoryRepository
        + InviteRepository
        + DirectoryReader
        + ReminderSource
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("data integrity violation: {0}")]
    Integrity(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
