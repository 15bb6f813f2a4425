//! Collaboration workflow engine.
//!
//! A collaboration is a request for an outside collaborator to help with one scholarship
//! application: a recommendation letter, an essay review, or a guidance session. The base record
//! is shared by every type and the type-specific attributes live in a separate extension record.
//! The service layer owns ownership checks, invite tokens, and the audit trail; the reminder
//! scheduler runs independently against the same store.

pub mod dates;
pub(crate) mod diff;
pub mod domain;
mod history;
pub mod invites;
pub mod memory;
pub mod notify;
pub mod reminders;
pub mod repository;
pub mod router;
pub(crate) mod sanitize;
pub mod service;
pub(crate) mod templates;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationSummary, BaseChanges, Collaboration, CollaborationDetails,
    CollaborationId, CollaborationInvite, CollaborationPatch, CollaborationType, CollaborationView,
    CollaboratorId, CollaboratorSummary, DeliveryStatus, DetailsPatch, EssayReviewDetails,
    EssayReviewPatch, GuidanceDetails, GuidancePatch, HistoryEntry, HistoryNote,
    NewCollaboration, RecommendationDetails, RecommendationPatch, StudentContact, UserId,
};
pub use invites::{generate_token, INVITE_TTL_DAYS};
pub use memory::InMemoryCollaborationStore;
pub use notify::{EmailGateway, EmailMessage, NotificationError, NotificationGateway, ResendGateway};
pub use reminders::{
    should_remind, ReminderConfig, ReminderKind, ReminderRunStats, ReminderSchedule,
    ReminderScheduler,
};
pub use repository::{CollaborationStore, RepositoryError};
pub use router::{collaboration_router, USER_ID_HEADER};
pub use service::{CollaborationError, CollaborationService, ValidationError, WorkflowSettings};
