use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{CollaborationId, HistoryEntry, HistoryNote, NewHistoryEntry, UserId};
use super::notify::NotificationGateway;
use super::repository::CollaborationStore;
use super::sanitize::sanitize_notes;
use super::service::{CollaborationError, CollaborationService, ValidationError};

impl<R, N> CollaborationService<R, N>
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    /// Audit trail for a collaboration, newest first.
    pub fn history(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<Vec<HistoryEntry>, CollaborationError> {
        self.get(id, owner)?;
        Ok(self.store.history_for(id)?)
    }

    /// Append a caller-supplied note to the audit trail.
    pub fn add_history(
        &self,
        id: CollaborationId,
        owner: UserId,
        note: HistoryNote,
    ) -> Result<HistoryEntry, CollaborationError> {
        self.get(id, owner)?;

        let action = note.action.trim();
        if action.is_empty() {
            return Err(ValidationError::EmptyAction.into());
        }

        Ok(self.store.append_history(NewHistoryEntry {
            collaboration_id: id,
            action: action.to_string(),
            details: sanitize_notes(note.details.as_deref()),
            created_at: Utc::now(),
        })?)
    }

    /// Records an audit row after a mutation has already been committed. A failure here is
    /// logged and dropped: the mutation stands either way.
    pub(super) fn append_history(
        &self,
        id: CollaborationId,
        action: &str,
        details: Option<String>,
        at: DateTime<Utc>,
    ) -> Option<HistoryEntry> {
        let entry = NewHistoryEntry {
            collaboration_id: id,
            action: action.to_string(),
            details,
            created_at: at,
        };

        match self.store.append_history(entry) {
            Ok(stored) => Some(stored),
            Err(err) => {
                warn!(
                    collaboration_id = %id,
                    action,
                    error = %err,
                    "failed to append collaboration history"
                );
                None
            }
        }
    }
}
