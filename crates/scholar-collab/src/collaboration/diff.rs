//! Audit diff generation.
//!
//! Each tracked field is declared once as a name, a predicate telling whether an update touched
//! it, and a renderer reading it from a composed record. Base and extension fields go through the
//! same loop, so adding a field means adding one entry here.

use chrono::{DateTime, NaiveDate, Utc};

use super::dates::DATE_FORMAT;
use super::domain::{
    CollaborationDetails, CollaborationPatch, CollaborationView, DetailsPatch, EssayReviewPatch,
    GuidancePatch, RecommendationPatch,
};

const EMPTY: &str = "none";

struct TrackedField {
    name: &'static str,
    touched: fn(&CollaborationPatch) -> bool,
    render: fn(&CollaborationView) -> Option<String>,
}

/// One changed field, rendered as `field: old → new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

impl FieldChange {
    pub fn summary(&self) -> String {
        format!("{}: {} → {}", self.field, self.before, self.after)
    }
}

/// Compares the fields present in `patch` between the records before and after the update.
pub fn changed_fields(
    patch: &CollaborationPatch,
    before: &CollaborationView,
    after: &CollaborationView,
) -> Vec<FieldChange> {
    tracked_fields()
        .iter()
        .filter(|field| (field.touched)(patch))
        .filter_map(|field| {
            let old = (field.render)(before);
            let new = (field.render)(after);
            (old != new).then(|| FieldChange {
                field: field.name,
                before: old.unwrap_or_else(|| EMPTY.to_string()),
                after: new.unwrap_or_else(|| EMPTY.to_string()),
            })
        })
        .collect()
}

/// Comma-joined summary suitable for a history row's `details`.
pub fn summarize(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(FieldChange::summary)
        .collect::<Vec<_>>()
        .join(", ")
}

fn date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|date| date.format(DATE_FORMAT).to_string())
}

fn datetime(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|at| at.to_rfc3339())
}

fn recommendation(patch: &CollaborationPatch) -> Option<&RecommendationPatch> {
    match &patch.details {
        Some(DetailsPatch::Recommendation(inner)) => Some(inner),
        _ => None,
    }
}

fn essay_review(patch: &CollaborationPatch) -> Option<&EssayReviewPatch> {
    match &patch.details {
        Some(DetailsPatch::EssayReview(inner)) => Some(inner),
        _ => None,
    }
}

fn guidance(patch: &CollaborationPatch) -> Option<&GuidancePatch> {
    match &patch.details {
        Some(DetailsPatch::Guidance(inner)) => Some(inner),
        _ => None,
    }
}

fn tracked_fields() -> Vec<TrackedField> {
    vec![
        TrackedField {
            name: "status",
            touched: |patch| patch.status.is_some(),
            render: |view| Some(view.collaboration.status.clone()),
        },
        TrackedField {
            name: "awaiting_action_from",
            touched: |patch| patch.awaiting_action_from.is_some(),
            render: |view| view.collaboration.awaiting_action_from.clone(),
        },
        TrackedField {
            name: "awaiting_action_type",
            touched: |patch| patch.awaiting_action_type.is_some(),
            render: |view| view.collaboration.awaiting_action_type.clone(),
        },
        TrackedField {
            name: "next_action_description",
            touched: |patch| patch.next_action_description.is_some(),
            render: |view| view.collaboration.next_action_description.clone(),
        },
        TrackedField {
            name: "next_action_due_date",
            touched: |patch| patch.next_action_due_date.is_some(),
            render: |view| date(view.collaboration.next_action_due_date),
        },
        TrackedField {
            name: "notes",
            touched: |patch| patch.notes.is_some(),
            render: |view| view.collaboration.notes.clone(),
        },
        TrackedField {
            name: "portal_url",
            touched: |patch| recommendation(patch).is_some_and(|p| p.portal_url.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::Recommendation(details) => details.portal_url.clone(),
                _ => None,
            },
        },
        TrackedField {
            name: "portal_deadline",
            touched: |patch| recommendation(patch).is_some_and(|p| p.portal_deadline.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::Recommendation(details) => date(details.portal_deadline),
                _ => None,
            },
        },
        TrackedField {
            name: "questionnaire_completed",
            touched: |patch| {
                recommendation(patch).is_some_and(|p| p.questionnaire_completed.is_some())
            },
            render: |view| match &view.details {
                CollaborationDetails::Recommendation(details) => {
                    Some(details.questionnaire_completed.to_string())
                }
                _ => None,
            },
        },
        TrackedField {
            name: "current_draft_version",
            touched: |patch| essay_review(patch).is_some_and(|p| p.current_draft_version.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::EssayReview(details) => {
                    Some(details.current_draft_version.to_string())
                }
                _ => None,
            },
        },
        TrackedField {
            name: "feedback_rounds",
            touched: |patch| essay_review(patch).is_some_and(|p| p.feedback_rounds.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::EssayReview(details) => {
                    Some(details.feedback_rounds.to_string())
                }
                _ => None,
            },
        },
        TrackedField {
            name: "last_feedback_at",
            touched: |patch| essay_review(patch).is_some_and(|p| p.last_feedback_at.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::EssayReview(details) => datetime(details.last_feedback_at),
                _ => None,
            },
        },
        TrackedField {
            name: "session_type",
            touched: |patch| guidance(patch).is_some_and(|p| p.session_type.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::Guidance(details) => details.session_type.clone(),
                _ => None,
            },
        },
        TrackedField {
            name: "meeting_url",
            touched: |patch| guidance(patch).is_some_and(|p| p.meeting_url.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::Guidance(details) => details.meeting_url.clone(),
                _ => None,
            },
        },
        TrackedField {
            name: "scheduled_for",
            touched: |patch| guidance(patch).is_some_and(|p| p.scheduled_for.is_some()),
            render: |view| match &view.details {
                CollaborationDetails::Guidance(details) => datetime(details.scheduled_for),
                _ => None,
            },
        },
    ]
}
