use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::Utc;
use scholar_collab::collaboration::{
    collaboration_router, CollaborationService, CollaborationStore, NotificationGateway,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Header the external cron job must send when `CRON_SECRET` is configured.
pub(crate) const CRON_SECRET_HEADER: &str = "x-cron-secret";

pub(crate) fn with_collaboration_routes<R, N>(
    service: Arc<CollaborationService<R, N>>,
) -> axum::Router
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    collaboration_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/reminders/run",
            axum::routing::post(run_reminders_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Runs both reminder sweeps once and returns the aggregate counts.
pub(crate) async fn run_reminders_endpoint(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(expected) = state.cron_secret.as_deref() {
        let provided = headers
            .get(CRON_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            warn!("rejected reminder trigger with missing or wrong cron secret");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid cron secret" })),
            )
                .into_response();
        }
    }

    let stats = state.reminders.run(Utc::now()).await;
    (StatusCode::OK, Json(stats)).into_response()
}
