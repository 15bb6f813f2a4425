use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    ApplicationId, ApplicationSummary, BaseChanges, Collaboration, CollaborationDetails,
    CollaborationDraft, CollaborationId, CollaborationInvite, CollaborationView, CollaboratorId,
    CollaboratorSummary, HistoryEntry, HistoryId, InviteId, NewHistoryEntry, NewInvite,
    StudentContact, UserId,
};
use super::repository::{
    ApplicationReminderCandidate, CollaborationReminderCandidate, CollaborationRepository,
    DirectoryReader, HistoryRepository, InviteRepository, ReminderSource, RepositoryError,
};

/// Process-local store used by the demo CLI, the development server, and tests.
///
/// Every write happens under a single lock, so each trait call is atomic. Foreign keys are
/// checked the way a relational store would: extensions, invites, and history rows require an
/// existing base row, and deleting the base row cascades.
#[derive(Default, Clone)]
pub struct InMemoryCollaborationStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    sequence: i64,
    students: HashMap<UserId, StudentContact>,
    collaborators: HashMap<CollaboratorId, CollaboratorSummary>,
    applications: BTreeMap<ApplicationId, ApplicationSummary>,
    collaborations: BTreeMap<CollaborationId, Collaboration>,
    details: HashMap<CollaborationId, CollaborationDetails>,
    invites: BTreeMap<InviteId, CollaborationInvite>,
    history: BTreeMap<HistoryId, HistoryEntry>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn compose(&self, record: &Collaboration) -> Result<CollaborationView, RepositoryError> {
        let details = self.details.get(&record.id).cloned().ok_or_else(|| {
            RepositoryError::Integrity(format!("collaboration {} has no extension row", record.id))
        })?;
        let collaborator = self
            .collaborators
            .get(&record.collaborator_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::Integrity(format!(
                    "collaboration {} references missing collaborator {}",
                    record.id, record.collaborator_id
                ))
            })?;

        Ok(CollaborationView {
            collaboration: record.clone(),
            details,
            collaborator,
        })
    }

    fn owned_by(&self, record: &Collaboration, owner: UserId) -> bool {
        self.collaborators
            .get(&record.collaborator_id)
            .is_some_and(|collaborator| collaborator.user_id == owner)
    }

    fn require_collaboration(&self, id: CollaborationId) -> Result<(), RepositoryError> {
        if self.collaborations.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

impl InMemoryCollaborationStore {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_student(&self, email: &str, first_name: &str) -> StudentContact {
        let mut state = self.state();
        let contact = StudentContact {
            user_id: UserId(state.next_id()),
            email: email.to_string(),
            first_name: first_name.to_string(),
        };
        state.students.insert(contact.user_id, contact.clone());
        contact
    }

    pub fn add_collaborator(
        &self,
        owner: UserId,
        first_name: &str,
        last_name: &str,
        email: &str,
        relationship: Option<&str>,
    ) -> CollaboratorSummary {
        let mut state = self.state();
        let collaborator = CollaboratorSummary {
            id: CollaboratorId(state.next_id()),
            user_id: owner,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            relationship: relationship.map(str::to_string),
        };
        state
            .collaborators
            .insert(collaborator.id, collaborator.clone());
        collaborator
    }

    pub fn add_application(
        &self,
        owner: UserId,
        scholarship_name: &str,
        status: &str,
        due_date: Option<NaiveDate>,
    ) -> ApplicationSummary {
        let mut state = self.state();
        let application = ApplicationSummary {
            id: ApplicationId(state.next_id()),
            user_id: owner,
            scholarship_name: scholarship_name.to_string(),
            status: status.to_string(),
            due_date,
            last_reminder_sent_at: None,
        };
        state
            .applications
            .insert(application.id, application.clone());
        application
    }

    /// Raw base row, bypassing ownership checks.
    pub fn collaboration_row(&self, id: CollaborationId) -> Option<Collaboration> {
        self.state().collaborations.get(&id).cloned()
    }

    pub fn details_row(&self, id: CollaborationId) -> Option<CollaborationDetails> {
        self.state().details.get(&id).cloned()
    }

    pub fn application_row(&self, id: ApplicationId) -> Option<ApplicationSummary> {
        self.state().applications.get(&id).cloned()
    }
}

impl CollaborationRepository for InMemoryCollaborationStore {
    fn insert_collaboration(
        &self,
        draft: CollaborationDraft,
    ) -> Result<Collaboration, RepositoryError> {
        let mut state = self.state();
        if !state.collaborators.contains_key(&draft.collaborator_id) {
            return Err(RepositoryError::Integrity(format!(
                "unknown collaborator {}",
                draft.collaborator_id
            )));
        }
        if !state.applications.contains_key(&draft.application_id) {
            return Err(RepositoryError::Integrity(format!(
                "unknown application {}",
                draft.application_id
            )));
        }

        let record = Collaboration {
            id: CollaborationId(state.next_id()),
            user_id: draft.user_id,
            collaborator_id: draft.collaborator_id,
            application_id: draft.application_id,
            collaboration_type: draft.collaboration_type,
            status: draft.status,
            awaiting_action_from: draft.awaiting_action_from,
            awaiting_action_type: draft.awaiting_action_type,
            next_action_description: draft.next_action_description,
            next_action_due_date: draft.next_action_due_date,
            notes: draft.notes,
            last_reminder_sent_at: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        state.collaborations.insert(record.id, record.clone());
        Ok(record)
    }

    fn insert_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.require_collaboration(id)?;
        if state.details.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        state.details.insert(id, details.clone());
        Ok(())
    }

    fn update_collaboration(
        &self,
        id: CollaborationId,
        changes: &BaseChanges,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        match state.collaborations.get_mut(&id) {
            Some(existing) => {
                changes.apply_to(existing);
                existing.updated_at = at;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn update_details(
        &self,
        id: CollaborationId,
        details: &CollaborationDetails,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        match state.details.get_mut(&id) {
            Some(existing) => {
                *existing = details.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_collaboration(&self, id: CollaborationId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.require_collaboration(id)?;
        state.history.retain(|_, entry| entry.collaboration_id != id);
        state.invites.retain(|_, invite| invite.collaboration_id != id);
        state.details.remove(&id);
        state.collaborations.remove(&id);
        Ok(())
    }

    fn fetch_owned(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<Option<CollaborationView>, RepositoryError> {
        let state = self.state();
        match state.collaborations.get(&id) {
            Some(record) if state.owned_by(record, owner) => state.compose(record).map(Some),
            _ => Ok(None),
        }
    }

    fn list_for_application(
        &self,
        application_id: ApplicationId,
        owner: UserId,
    ) -> Result<Vec<CollaborationView>, RepositoryError> {
        let state = self.state();
        let mut records: Vec<&Collaboration> = state
            .collaborations
            .values()
            .filter(|record| record.application_id == application_id)
            .filter(|record| state.owned_by(record, owner))
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        records
            .into_iter()
            .map(|record| state.compose(record))
            .collect()
    }
}

impl HistoryRepository for InMemoryCollaborationStore {
    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, RepositoryError> {
        let mut state = self.state();
        state.require_collaboration(entry.collaboration_id)?;
        let stored = HistoryEntry {
            id: HistoryId(state.next_id()),
            collaboration_id: entry.collaboration_id,
            action: entry.action,
            details: entry.details,
            created_at: entry.created_at,
        };
        state.history.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn history_for(&self, id: CollaborationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let state = self.state();
        let mut entries: Vec<HistoryEntry> = state
            .history
            .values()
            .filter(|entry| entry.collaboration_id == id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(entries)
    }
}

impl InviteRepository for InMemoryCollaborationStore {
    fn insert_invite(&self, invite: NewInvite) -> Result<CollaborationInvite, RepositoryError> {
        let mut state = self.state();
        state.require_collaboration(invite.collaboration_id)?;
        if state
            .invites
            .values()
            .any(|existing| existing.invite_token == invite.invite_token)
        {
            return Err(RepositoryError::Conflict);
        }

        let stored = CollaborationInvite {
            id: InviteId(state.next_id()),
            collaboration_id: invite.collaboration_id,
            user_id: invite.user_id,
            invite_token: invite.invite_token,
            sent_at: invite.sent_at,
            expires_at: invite.expires_at,
            delivery_status: invite.delivery_status,
            opened_at: None,
            clicked_at: None,
            external_message_id: invite.external_message_id,
            created_at: invite.created_at,
        };
        state.invites.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn latest_invite(
        &self,
        id: CollaborationId,
    ) -> Result<Option<CollaborationInvite>, RepositoryError> {
        let state = self.state();
        Ok(state
            .invites
            .values()
            .filter(|invite| invite.collaboration_id == id)
            .max_by_key(|invite| (invite.created_at, invite.id))
            .cloned())
    }

    fn update_invite(&self, invite: &CollaborationInvite) -> Result<(), RepositoryError> {
        let mut state = self.state();
        if state
            .invites
            .values()
            .any(|other| other.id != invite.id && other.invite_token == invite.invite_token)
        {
            return Err(RepositoryError::Conflict);
        }
        match state.invites.get_mut(&invite.id) {
            Some(existing) => {
                *existing = invite.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn invites_for(
        &self,
        id: CollaborationId,
    ) -> Result<Vec<CollaborationInvite>, RepositoryError> {
        let state = self.state();
        Ok(state
            .invites
            .values()
            .filter(|invite| invite.collaboration_id == id)
            .cloned()
            .collect())
    }
}

impl DirectoryReader for InMemoryCollaborationStore {
    fn collaborator(
        &self,
        id: CollaboratorId,
        owner: UserId,
    ) -> Result<Option<CollaboratorSummary>, RepositoryError> {
        let state = self.state();
        Ok(state
            .collaborators
            .get(&id)
            .filter(|collaborator| collaborator.user_id == owner)
            .cloned())
    }

    fn application(
        &self,
        id: ApplicationId,
        owner: UserId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError> {
        let state = self.state();
        Ok(state
            .applications
            .get(&id)
            .filter(|application| application.user_id == owner)
            .cloned())
    }

    fn student(&self, id: UserId) -> Result<Option<StudentContact>, RepositoryError> {
        Ok(self.state().students.get(&id).cloned())
    }
}

impl ReminderSource for InMemoryCollaborationStore {
    fn applications_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ApplicationReminderCandidate>, RepositoryError> {
        let state = self.state();
        let mut candidates = Vec::new();
        for application in state.applications.values() {
            let Some(due) = application.due_date else {
                continue;
            };
            if due < from || due > to {
                continue;
            }
            let student = state.students.get(&application.user_id).cloned().ok_or_else(|| {
                RepositoryError::Integrity(format!(
                    "application {} references missing student {}",
                    application.id, application.user_id
                ))
            })?;
            candidates.push(ApplicationReminderCandidate {
                application: application.clone(),
                student,
            });
        }
        Ok(candidates)
    }

    fn collaborations_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CollaborationReminderCandidate>, RepositoryError> {
        let state = self.state();
        let mut candidates = Vec::new();
        for record in state.collaborations.values() {
            let Some(due) = record.next_action_due_date else {
                continue;
            };
            if due < from || due > to {
                continue;
            }

            let integrity = |what: &str| {
                RepositoryError::Integrity(format!("collaboration {} is missing its {what}", record.id))
            };
            let collaborator = state
                .collaborators
                .get(&record.collaborator_id)
                .cloned()
                .ok_or_else(|| integrity("collaborator"))?;
            let application = state
                .applications
                .get(&record.application_id)
                .cloned()
                .ok_or_else(|| integrity("application"))?;
            let student = state
                .students
                .get(&collaborator.user_id)
                .cloned()
                .ok_or_else(|| integrity("student"))?;

            candidates.push(CollaborationReminderCandidate {
                collaboration: record.clone(),
                collaborator,
                application,
                student,
            });
        }
        Ok(candidates)
    }

    fn mark_application_reminded(
        &self,
        id: ApplicationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let application = state
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        application.last_reminder_sent_at = Some(at);
        Ok(())
    }

    fn mark_collaboration_reminded(
        &self,
        id: CollaborationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let record = state
            .collaborations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        record.last_reminder_sent_at = Some(at);
        Ok(())
    }
}
