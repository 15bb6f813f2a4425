//! Minimal e-mail copy. Layout and branding belong to the presentation layer; these bodies only
//! carry the facts a recipient needs to act.

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    ApplicationSummary, CollaborationType, CollaboratorSummary, StudentContact,
};
use super::notify::EmailMessage;
use super::reminders::ReminderKind;
use super::repository::{ApplicationReminderCandidate, CollaborationReminderCandidate};

pub fn invitation(
    student: &StudentContact,
    collaborator: &CollaboratorSummary,
    application: &ApplicationSummary,
    collaboration_type: CollaborationType,
    link: &str,
    expires_at: DateTime<Utc>,
) -> EmailMessage {
    let subject = format!(
        "{} is asking for your help with a {}",
        student.first_name,
        collaboration_type.display_name()
    );
    let html = format!(
        "<p>Hi {collaborator},</p>\
         <p>{student} has invited you to help with a {kind} for the \
         <strong>{scholarship}</strong> scholarship application.</p>\
         <p><a href=\"{link}\">Respond to the request</a></p>\
         <p>This link expires on {expires}.</p>",
        collaborator = escape_html(&collaborator.first_name),
        student = escape_html(&student.first_name),
        kind = collaboration_type.display_name(),
        scholarship = escape_html(&application.scholarship_name),
        link = escape_html(link),
        expires = expires_at.format("%B %-d, %Y"),
    );

    EmailMessage {
        to: collaborator.email.clone(),
        subject,
        html,
    }
}

pub fn application_reminder(
    candidate: &ApplicationReminderCandidate,
    due: NaiveDate,
    kind: ReminderKind,
    days: u32,
) -> EmailMessage {
    let name = &candidate.application.scholarship_name;
    let subject = match kind {
        ReminderKind::DueSoon => format!("{name} is due in {}", plural_days(days)),
        ReminderKind::Overdue => format!("{name} was due {} ago", plural_days(days)),
    };
    let html = format!(
        "<p>Hi {student},</p><p>Your application for <strong>{scholarship}</strong> {state} \
         ({due}).</p>",
        student = escape_html(&candidate.student.first_name),
        scholarship = escape_html(name),
        state = describe(kind, days),
        due = due.format("%B %-d, %Y"),
    );

    EmailMessage {
        to: candidate.student.email.clone(),
        subject,
        html,
    }
}

pub fn collaboration_reminder(
    candidate: &CollaborationReminderCandidate,
    recipient: &str,
    greeting_name: &str,
    due: NaiveDate,
    kind: ReminderKind,
    days: u32,
) -> EmailMessage {
    let collaboration = &candidate.collaboration;
    let task = collaboration
        .next_action_description
        .clone()
        .unwrap_or_else(|| collaboration.collaboration_type.display_name().to_string());
    let subject = match kind {
        ReminderKind::DueSoon => format!("Reminder: {task} due in {}", plural_days(days)),
        ReminderKind::Overdue => format!("Overdue: {task}"),
    };
    let html = format!(
        "<p>Hi {greeting},</p><p>The {task} for {student}'s <strong>{scholarship}</strong> \
         application with {collaborator} {state} ({due}).</p>",
        greeting = escape_html(greeting_name),
        task = escape_html(&task),
        student = escape_html(&candidate.student.first_name),
        scholarship = escape_html(&candidate.application.scholarship_name),
        collaborator = escape_html(&candidate.collaborator.full_name()),
        state = describe(kind, days),
        due = due.format("%B %-d, %Y"),
    );

    EmailMessage {
        to: recipient.to_string(),
        subject,
        html,
    }
}

fn describe(kind: ReminderKind, days: u32) -> String {
    match kind {
        ReminderKind::DueSoon => format!("is due in {}", plural_days(days)),
        ReminderKind::Overdue => format!("was due {} ago", plural_days(days)),
    }
}

fn plural_days(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
