use super::common::*;
use crate::collaboration::domain::{status, CollaborationPatch, HistoryNote, UserId};
use crate::collaboration::{CollaborationError, ValidationError};

#[test]
fn creation_is_recorded_in_history() {
    let (service, seed, _) = build_service();
    let created = service
        .create(seed.owner(), recommendation_input(&seed))
        .expect("create succeeds");

    let history = service
        .history(created.id(), seed.owner())
        .expect("history succeeds");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "created");
    assert_eq!(
        history[0].details.as_deref(),
        Some("Created recommendation letter collaboration")
    );
}

#[test]
fn listing_history_twice_returns_identical_results() {
    let (service, seed, _) = build_service();
    let created = service
        .create(seed.owner(), recommendation_input(&seed))
        .expect("create succeeds");
    service
        .update(
            created.id(),
            seed.owner(),
            CollaborationPatch {
                status: Some(status::ACCEPTED.to_string()),
                ..Default::default()
            },
        )
        .expect("update succeeds");

    let first = service.history(created.id(), seed.owner()).expect("first");
    let second = service.history(created.id(), seed.owner()).expect("second");
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].action, "accepted", "newest entry first");
    assert_eq!(first[1].action, "created");
}

#[test]
fn manual_notes_are_trimmed_and_sanitized() {
    let (service, seed, _) = build_service();
    let created = service
        .create(seed.owner(), recommendation_input(&seed))
        .expect("create succeeds");

    let entry = service
        .add_history(
            created.id(),
            seed.owner(),
            HistoryNote {
                action: "  called_recommender ".to_string(),
                details: Some("<b>Left</b> a voicemail".to_string()),
            },
        )
        .expect("note stored");

    assert_eq!(entry.action, "called_recommender");
    assert_eq!(entry.details.as_deref(), Some("Left a voicemail"));
    let history = service.history(created.id(), seed.owner()).expect("history");
    assert!(history.contains(&entry));
}

#[test]
fn blank_manual_action_is_rejected() {
    let (service, seed, _) = build_service();
    let created = service
        .create(seed.owner(), recommendation_input(&seed))
        .expect("create succeeds");

    let result = service.add_history(
        created.id(),
        seed.owner(),
        HistoryNote {
            action: "   ".to_string(),
            details: None,
        },
    );
    assert!(matches!(
        result,
        Err(CollaborationError::Validation(ValidationError::EmptyAction))
    ));
}

#[test]
fn history_of_foreign_collaboration_is_not_found() {
    let (service, seed, _) = build_service();
    let created = service
        .create(seed.owner(), recommendation_input(&seed))
        .expect("create succeeds");

    assert!(matches!(
        service.history(created.id(), UserId(999)),
        Err(CollaborationError::NotFound(_))
    ));
    assert!(matches!(
        service.add_history(
            created.id(),
            UserId(999),
            HistoryNote {
                action: "note".to_string(),
                details: None,
            },
        ),
        Err(CollaborationError::NotFound(_))
    ));
}
