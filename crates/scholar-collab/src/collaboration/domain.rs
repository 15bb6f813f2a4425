use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dates::{nullable, nullable_date, nullable_datetime, optional_date, optional_datetime};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Account holder (the student) owning applications, collaborators, and collaborations.
    UserId
);
record_id!(CollaboratorId);
record_id!(
    /// Scholarship application the collaboration is attached to.
    ApplicationId
);
record_id!(CollaborationId);
record_id!(InviteId);
record_id!(HistoryId);

/// Well-known collaboration statuses. Status is stored as an open string so new values do not
/// need a schema change; these constants cover the values the workflow itself writes or reads.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const INVITED: &str = "invited";
    pub const ACCEPTED: &str = "accepted";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
    pub const DECLINED: &str = "declined";
}

/// Party expected to act next on a collaboration.
pub mod awaiting {
    pub const COLLABORATOR: &str = "collaborator";
    pub const STUDENT: &str = "student";
}

/// Discriminant selecting which extension record a collaboration carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollaborationType {
    Recommendation,
    EssayReview,
    Guidance,
}

impl CollaborationType {
    pub const fn label(self) -> &'static str {
        match self {
            CollaborationType::Recommendation => "recommendation",
            CollaborationType::EssayReview => "essayReview",
            CollaborationType::Guidance => "guidance",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            CollaborationType::Recommendation => "recommendation letter",
            CollaborationType::EssayReview => "essay review",
            CollaborationType::Guidance => "guidance session",
        }
    }

    /// Recommendation requests are always tied to a letter deadline.
    pub const fn requires_due_date(self) -> bool {
        matches!(self, CollaborationType::Recommendation)
    }
}

impl fmt::Display for CollaborationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationDetails {
    #[serde(default)]
    pub portal_url: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub portal_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub questionnaire_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayReviewDetails {
    #[serde(default = "first_draft")]
    pub current_draft_version: u32,
    #[serde(default)]
    pub feedback_rounds: u32,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub last_feedback_at: Option<DateTime<Utc>>,
}

fn first_draft() -> u32 {
    1
}

impl Default for EssayReviewDetails {
    fn default() -> Self {
        Self {
            current_draft_version: first_draft(),
            feedback_rounds: 0,
            last_feedback_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceDetails {
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Type-specific extension record. Exactly one exists per collaboration and its variant always
/// matches the collaboration's `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollaborationDetails {
    Recommendation(RecommendationDetails),
    EssayReview(EssayReviewDetails),
    Guidance(GuidanceDetails),
}

impl CollaborationDetails {
    pub fn empty(collaboration_type: CollaborationType) -> Self {
        match collaboration_type {
            CollaborationType::Recommendation => Self::Recommendation(Default::default()),
            CollaborationType::EssayReview => Self::EssayReview(Default::default()),
            CollaborationType::Guidance => Self::Guidance(Default::default()),
        }
    }

    pub fn collaboration_type(&self) -> CollaborationType {
        match self {
            Self::Recommendation(_) => CollaborationType::Recommendation,
            Self::EssayReview(_) => CollaborationType::EssayReview,
            Self::Guidance(_) => CollaborationType::Guidance,
        }
    }
}

/// Base collaboration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaboration {
    pub id: CollaborationId,
    pub user_id: UserId,
    pub collaborator_id: CollaboratorId,
    pub application_id: ApplicationId,
    #[serde(rename = "type")]
    pub collaboration_type: CollaborationType,
    pub status: String,
    pub awaiting_action_from: Option<String>,
    pub awaiting_action_type: Option<String>,
    pub next_action_description: Option<String>,
    pub next_action_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the store needs to insert a base row; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaborationDraft {
    pub user_id: UserId,
    pub collaborator_id: CollaboratorId,
    pub application_id: ApplicationId,
    pub collaboration_type: CollaborationType,
    pub status: String,
    pub awaiting_action_from: Option<String>,
    pub awaiting_action_type: Option<String>,
    pub next_action_description: Option<String>,
    pub next_action_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorSummary {
    pub id: CollaboratorId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub relationship: Option<String>,
}

impl CollaboratorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Composed read model: base row, its extension, and the collaborator it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationView {
    #[serde(flatten)]
    pub collaboration: Collaboration,
    pub details: CollaborationDetails,
    pub collaborator: CollaboratorSummary,
}

impl CollaborationView {
    pub fn id(&self) -> CollaborationId {
        self.collaboration.id
    }

    pub fn status(&self) -> &str {
        &self.collaboration.status
    }
}

/// Scholarship application as seen by this core: ownership plus what reminders need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub scholarship_name: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentContact {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
}

/// Payload accepted by `create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollaboration {
    pub collaborator_id: CollaboratorId,
    pub application_id: ApplicationId,
    #[serde(rename = "type")]
    pub collaboration_type: CollaborationType,
    #[serde(default)]
    pub awaiting_action_from: Option<String>,
    #[serde(default)]
    pub awaiting_action_type: Option<String>,
    #[serde(default)]
    pub next_action_description: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub next_action_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub details: Option<CollaborationDetails>,
}

impl NewCollaboration {
    pub fn new(
        collaborator_id: CollaboratorId,
        application_id: ApplicationId,
        collaboration_type: CollaborationType,
    ) -> Self {
        Self {
            collaborator_id,
            application_id,
            collaboration_type,
            awaiting_action_from: None,
            awaiting_action_type: None,
            next_action_description: None,
            next_action_due_date: None,
            notes: None,
            details: None,
        }
    }
}

/// Partial update. An absent field is left alone; an explicit `null` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationPatch {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub awaiting_action_from: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub awaiting_action_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub next_action_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub next_action_due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub details: Option<DetailsPatch>,
}

impl CollaborationPatch {
    pub fn touches_base(&self) -> bool {
        self.status.is_some()
            || self.awaiting_action_from.is_some()
            || self.awaiting_action_type.is_some()
            || self.next_action_description.is_some()
            || self.next_action_due_date.is_some()
            || self.notes.is_some()
    }
}

/// Base-row columns a single write sets. Columns left as `None` keep their stored value, so
/// concurrent writers touching other columns (the reminder stamp, another patch) are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseChanges {
    pub status: Option<String>,
    pub awaiting_action_from: Option<Option<String>>,
    pub awaiting_action_type: Option<Option<String>>,
    pub next_action_description: Option<Option<String>>,
    pub next_action_due_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}

impl BaseChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, record: &mut Collaboration) {
        if let Some(value) = &self.status {
            record.status = value.clone();
        }
        if let Some(value) = &self.awaiting_action_from {
            record.awaiting_action_from = value.clone();
        }
        if let Some(value) = &self.awaiting_action_type {
            record.awaiting_action_type = value.clone();
        }
        if let Some(value) = &self.next_action_description {
            record.next_action_description = value.clone();
        }
        if let Some(value) = self.next_action_due_date {
            record.next_action_due_date = value;
        }
        if let Some(value) = &self.notes {
            record.notes = value.clone();
        }
    }
}

/// Partial update for the extension record, tagged with the collaboration type it targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DetailsPatch {
    Recommendation(RecommendationPatch),
    EssayReview(EssayReviewPatch),
    Guidance(GuidancePatch),
}

impl DetailsPatch {
    pub fn collaboration_type(&self) -> CollaborationType {
        match self {
            Self::Recommendation(_) => CollaborationType::Recommendation,
            Self::EssayReview(_) => CollaborationType::EssayReview,
            Self::Guidance(_) => CollaborationType::Guidance,
        }
    }

    /// Applies the patch in place; returns `false` when the variants disagree.
    pub fn apply_to(&self, details: &mut CollaborationDetails) -> bool {
        match (self, details) {
            (Self::Recommendation(patch), CollaborationDetails::Recommendation(current)) => {
                if let Some(value) = &patch.portal_url {
                    current.portal_url = value.clone();
                }
                if let Some(value) = patch.portal_deadline {
                    current.portal_deadline = value;
                }
                if let Some(value) = patch.questionnaire_completed {
                    current.questionnaire_completed = value;
                }
                true
            }
            (Self::EssayReview(patch), CollaborationDetails::EssayReview(current)) => {
                if let Some(value) = patch.current_draft_version {
                    current.current_draft_version = value;
                }
                if let Some(value) = patch.feedback_rounds {
                    current.feedback_rounds = value;
                }
                if let Some(value) = patch.last_feedback_at {
                    current.last_feedback_at = value;
                }
                true
            }
            (Self::Guidance(patch), CollaborationDetails::Guidance(current)) => {
                if let Some(value) = &patch.session_type {
                    current.session_type = value.clone();
                }
                if let Some(value) = &patch.meeting_url {
                    current.meeting_url = value.clone();
                }
                if let Some(value) = patch.scheduled_for {
                    current.scheduled_for = value;
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationPatch {
    #[serde(default, deserialize_with = "nullable")]
    pub portal_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub portal_deadline: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub questionnaire_completed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayReviewPatch {
    #[serde(default)]
    pub current_draft_version: Option<u32>,
    #[serde(default)]
    pub feedback_rounds: Option<u32>,
    #[serde(default, deserialize_with = "nullable_datetime")]
    pub last_feedback_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidancePatch {
    #[serde(default, deserialize_with = "nullable")]
    pub session_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub meeting_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_datetime")]
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationInvite {
    pub id: InviteId,
    pub collaboration_id: CollaborationId,
    pub user_id: UserId,
    /// Never echoed back to API callers; it only travels inside the invitation e-mail.
    #[serde(skip_serializing, default)]
    pub invite_token: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub external_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CollaborationInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvite {
    pub collaboration_id: CollaborationId,
    pub user_id: UserId,
    pub invite_token: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
    pub external_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub collaboration_id: CollaborationId,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub collaboration_id: CollaborationId,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Manual audit note posted through the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryNote {
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
}
