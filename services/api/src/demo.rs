use crate::infra::{seed_demo_directory, OutboxGateway};
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use clap::Args;
use scholar_collab::collaboration::{
    CollaborationPatch, CollaborationService, CollaborationType, InMemoryCollaborationStore,
    NewCollaboration, ReminderConfig, ReminderScheduler, WorkflowSettings,
};
use scholar_collab::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the reminder sweep runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Days between `today` and the recommendation due date. Defaults to 3.
    #[arg(long, default_value_t = 3)]
    pub(crate) due_in_days: u32,
    /// Print the rendered HTML bodies of captured e-mails.
    #[arg(long)]
    pub(crate) show_bodies: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        due_in_days,
        show_bodies,
    } = args;

    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let due = today
        .checked_add_days(Days::new(u64::from(due_in_days)))
        .unwrap_or(today);

    println!("Scholarship collaboration demo");
    println!("- Sweep date: {today}");
    println!("- Recommendation due: {due}");

    let store = Arc::new(InMemoryCollaborationStore::default());
    let gateway = Arc::new(OutboxGateway::default());
    let directory = seed_demo_directory(&store, due);
    let owner = directory.student.user_id;
    let service =
        CollaborationService::new(store.clone(), gateway.clone(), WorkflowSettings::default());

    let mut input = NewCollaboration::new(
        directory.collaborator.id,
        directory.application.id,
        CollaborationType::Recommendation,
    );
    input.next_action_due_date = Some(due);
    input.next_action_description = Some("Upload recommendation letter".to_string());
    input.notes = Some("<p>Please mention the <b>robotics</b> club.</p>".to_string());

    let created = service.create(owner, input)?;
    println!(
        "\nCreated {} collaboration #{} with {} -> status {}",
        created.collaboration.collaboration_type.display_name(),
        created.id(),
        created.collaborator.full_name(),
        created.status()
    );
    if let Some(notes) = &created.collaboration.notes {
        println!("  Sanitized notes: {notes}");
    }

    let invite = service.send_invitation(created.id(), owner).await?;
    println!(
        "  Invitation {} -> delivery {} (expires {})",
        invite.id,
        invite.delivery_status.label(),
        invite.expires_at.format("%Y-%m-%d %H:%M UTC")
    );

    let accepted = service.update(
        created.id(),
        owner,
        CollaborationPatch {
            status: Some("accepted".to_string()),
            ..Default::default()
        },
    )?;
    println!("  Collaborator accepted -> status {}", accepted.status());

    println!("\nAudit trail (newest first):");
    for entry in service.history(created.id(), owner)? {
        println!(
            "  - [{}] {}: {}",
            entry.created_at.format("%H:%M:%S"),
            entry.action,
            entry.details.as_deref().unwrap_or("-")
        );
    }

    let scheduler = ReminderScheduler::new(
        store,
        gateway.clone(),
        ReminderConfig::default(),
        WorkflowSettings::default().gateway_timeout,
    );
    let sweep_at = today
        .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
        .and_utc();
    let first = scheduler.run(sweep_at).await;
    let second = scheduler.run(sweep_at).await;
    println!("\nReminder sweep at {}", sweep_at.format("%Y-%m-%d %H:%M UTC"));
    match serde_json::to_string_pretty(&first) {
        Ok(json) => println!("  First run:\n{json}"),
        Err(err) => println!("  First run unavailable: {err}"),
    }
    println!(
        "  Second run reminded {} item(s) (dedup window)",
        second.applications_reminded + second.collaborations_reminded
    );

    let messages = gateway.messages();
    println!("\nCaptured e-mails ({}):", messages.len());
    for message in messages {
        println!("  - to={} subject=\"{}\"", message.to, message.subject);
        if show_bodies {
            println!("    {}", message.html);
        }
    }

    Ok(())
}
