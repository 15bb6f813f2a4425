use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use super::diff;
use super::domain::{
    status, ApplicationId, BaseChanges, CollaborationDetails, CollaborationDraft,
    CollaborationId, CollaborationPatch, CollaborationType, CollaborationView, NewCollaboration,
    UserId,
};
use super::notify::{NotificationError, NotificationGateway};
use super::repository::{CollaborationStore, RepositoryError};
use super::sanitize::sanitize_notes;
use crate::config::NotificationConfig;

/// Knobs the workflow needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Base URL invite links are built from, e.g. `https://app.example.edu`.
    pub app_base_url: String,
    /// Upper bound on a single Notification Gateway call.
    pub gateway_timeout: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            app_base_url: config.app_base_url.clone(),
            gateway_timeout: config.timeout,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:3000".to_string(),
            gateway_timeout: Duration::from_secs(10),
        }
    }
}

/// Public operation surface for collaborations: ownership checks, per-type validation, the
/// base/extension write, and the audit trail.
pub struct CollaborationService<R, N> {
    pub(super) store: Arc<R>,
    pub(super) gateway: Arc<N>,
    pub(super) settings: WorkflowSettings,
}

impl<R, N> CollaborationService<R, N>
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(store: Arc<R>, gateway: Arc<N>, settings: WorkflowSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    /// Create a collaboration and its extension record.
    ///
    /// The base row is written first, then the extension. If the extension insert fails the base
    /// row is deleted again and the original error is returned.
    pub fn create(
        &self,
        owner: UserId,
        input: NewCollaboration,
    ) -> Result<CollaborationView, CollaborationError> {
        self.store
            .collaborator(input.collaborator_id, owner)?
            .ok_or(CollaborationError::NotFound("collaborator"))?;
        self.store
            .application(input.application_id, owner)?
            .ok_or(CollaborationError::NotFound("application"))?;

        if input.collaboration_type.requires_due_date() && input.next_action_due_date.is_none() {
            return Err(ValidationError::MissingDueDate.into());
        }

        let details = match input.details {
            Some(details) if details.collaboration_type() != input.collaboration_type => {
                return Err(ValidationError::DetailsTypeMismatch {
                    expected: input.collaboration_type,
                    actual: details.collaboration_type(),
                }
                .into());
            }
            Some(details) => details,
            None => CollaborationDetails::empty(input.collaboration_type),
        };

        let now = Utc::now();
        let base = self.store.insert_collaboration(CollaborationDraft {
            user_id: owner,
            collaborator_id: input.collaborator_id,
            application_id: input.application_id,
            collaboration_type: input.collaboration_type,
            status: status::PENDING.to_string(),
            awaiting_action_from: input.awaiting_action_from,
            awaiting_action_type: input.awaiting_action_type,
            next_action_description: input.next_action_description,
            next_action_due_date: input.next_action_due_date,
            notes: sanitize_notes(input.notes.as_deref()),
            created_at: now,
        })?;

        if let Err(err) = self.store.insert_details(base.id, &details) {
            if let Err(cleanup) = self.store.delete_collaboration(base.id) {
                error!(
                    collaboration_id = %base.id,
                    error = %cleanup,
                    "failed to remove base row after extension insert failed"
                );
            }
            return Err(err.into());
        }

        self.append_history(
            base.id,
            "created",
            Some(format!(
                "Created {} collaboration",
                input.collaboration_type.display_name()
            )),
            now,
        );

        info!(
            collaboration_id = %base.id,
            kind = %input.collaboration_type,
            "collaboration created"
        );
        self.get(base.id, owner)
    }

    /// Apply a partial update and record a single history row describing what changed.
    pub fn update(
        &self,
        id: CollaborationId,
        owner: UserId,
        patch: CollaborationPatch,
    ) -> Result<CollaborationView, CollaborationError> {
        let existing = self.get(id, owner)?;
        let mut next = existing.clone();

        let changes = base_changes(&patch);
        changes.apply_to(&mut next.collaboration);
        if let Some(details_patch) = &patch.details {
            if !details_patch.apply_to(&mut next.details) {
                return Err(ValidationError::DetailsTypeMismatch {
                    expected: existing.collaboration.collaboration_type,
                    actual: details_patch.collaboration_type(),
                }
                .into());
            }
        }

        if next.collaboration.collaboration_type.requires_due_date()
            && next.collaboration.next_action_due_date.is_none()
        {
            return Err(ValidationError::MissingDueDate.into());
        }

        // Extension first: if the base write then fails, the previous extension is put back and
        // nothing from this call stays committed.
        let now = Utc::now();
        if patch.details.is_some() {
            self.store.update_details(id, &next.details)?;
        }
        if !changes.is_empty() {
            if let Err(err) = self.store.update_collaboration(id, &changes, now) {
                if patch.details.is_some() {
                    if let Err(restore_err) = self.store.update_details(id, &existing.details) {
                        error!(
                            collaboration_id = %id,
                            error = %restore_err,
                            "failed to restore extension row after base update failure"
                        );
                    }
                }
                return Err(err.into());
            }
        }

        let updated = self.get(id, owner)?;
        let field_changes = diff::changed_fields(&patch, &existing, &updated);
        if !field_changes.is_empty() {
            let action = if updated.collaboration.status != existing.collaboration.status {
                updated.collaboration.status.clone()
            } else {
                "updated".to_string()
            };
            self.append_history(id, &action, Some(diff::summarize(&field_changes)), now);
        }

        Ok(updated)
    }

    pub fn delete(&self, id: CollaborationId, owner: UserId) -> Result<(), CollaborationError> {
        self.get(id, owner)?;
        self.store.delete_collaboration(id)?;
        info!(collaboration_id = %id, "collaboration deleted");
        Ok(())
    }

    /// Ownership-checked read. Every other operation goes through here first.
    pub fn get(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<CollaborationView, CollaborationError> {
        self.store
            .fetch_owned(id, owner)?
            .ok_or(CollaborationError::NotFound("collaboration"))
    }

    pub fn list_for_application(
        &self,
        application_id: ApplicationId,
        owner: UserId,
    ) -> Result<Vec<CollaborationView>, CollaborationError> {
        self.store
            .application(application_id, owner)?
            .ok_or(CollaborationError::NotFound("application"))?;
        Ok(self.store.list_for_application(application_id, owner)?)
    }

    pub(super) fn invite_link(&self, token: &str) -> String {
        format!(
            "{}/collaborate/{token}",
            self.settings.app_base_url.trim_end_matches('/')
        )
    }
}

fn base_changes(patch: &CollaborationPatch) -> BaseChanges {
    BaseChanges {
        status: patch.status.as_deref().map(|value| value.trim().to_string()),
        awaiting_action_from: patch.awaiting_action_from.clone(),
        awaiting_action_type: patch.awaiting_action_type.clone(),
        next_action_description: patch.next_action_description.clone(),
        next_action_due_date: patch.next_action_due_date,
        notes: patch
            .notes
            .as_ref()
            .map(|value| sanitize_notes(value.as_deref())),
    }
}

/// Error raised by the collaboration workflow.
///
/// `NotFound` covers both missing rows and rows owned by someone else so callers cannot probe
/// for other students' data.
#[derive(Debug, thiserror::Error)]
pub enum CollaborationError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    UpstreamFailure(#[from] NotificationError),
    #[error("internal error: {0}")]
    Internal(RepositoryError),
}

impl CollaborationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CollaborationError::NotFound(_) => StatusCode::NOT_FOUND,
            CollaborationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CollaborationError::UpstreamFailure(NotificationError::Unconfigured) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CollaborationError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            CollaborationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for CollaborationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound("record"),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for CollaborationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "collaboration request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("recommendation collaborations require a next action due date")]
    MissingDueDate,
    #[error("details are for a {actual} collaboration but this is a {expected} collaboration")]
    DetailsTypeMismatch {
        expected: CollaborationType,
        actual: CollaborationType,
    },
    #[error("the latest invite expired at {0}; send a new invitation instead")]
    InviteExpired(DateTime<Utc>),
    #[error("history action must not be empty")]
    EmptyAction,
}
