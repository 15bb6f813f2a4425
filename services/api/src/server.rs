use crate::cli::ServeArgs;
use crate::infra::{seed_demo_directory, AppState};
use crate::routes::with_collaboration_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Days, Utc};
use scholar_collab::collaboration::{
    CollaborationError, CollaborationService, EmailGateway, InMemoryCollaborationStore,
    ReminderScheduler, WorkflowSettings,
};
use scholar_collab::config::{AppConfig, AppEnvironment};
use scholar_collab::error::AppError;
use scholar_collab::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    // One gateway (and one HTTP client) for the whole process.
    let gateway = Arc::new(
        EmailGateway::from_config(&config.notifications).map_err(CollaborationError::from)?,
    );
    let store = Arc::new(InMemoryCollaborationStore::default());
    if config.environment == AppEnvironment::Development {
        let due = Utc::now()
            .date_naive()
            .checked_add_days(Days::new(7))
            .unwrap_or_else(|| Utc::now().date_naive());
        let directory = seed_demo_directory(&store, due);
        info!(
            user_id = %directory.student.user_id,
            collaborator_id = %directory.collaborator.id,
            application_id = %directory.application.id,
            "seeded development directory"
        );
    }

    let service = Arc::new(CollaborationService::new(
        store.clone(),
        gateway.clone(),
        WorkflowSettings::from_config(&config.notifications),
    ));
    let scheduler = Arc::new(ReminderScheduler::new(
        store,
        gateway.clone(),
        config.reminders.clone(),
        config.notifications.timeout,
    ));

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        reminders: scheduler,
        cron_secret: config.cron_secret.clone(),
    };

    let app = with_collaboration_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        email_configured = gateway.is_configured(),
        "scholarship collaboration service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
