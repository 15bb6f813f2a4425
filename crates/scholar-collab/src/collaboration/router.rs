use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::dates;
use super::domain::{
    ApplicationId, CollaborationId, CollaborationPatch, HistoryNote, NewCollaboration, UserId,
};
use super::notify::NotificationGateway;
use super::repository::CollaborationStore;
use super::service::CollaborationService;

/// Header carrying the authenticated student's id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Router builder exposing the collaboration workflow over HTTP.
pub fn collaboration_router<R, N>(service: Arc<CollaborationService<R, N>>) -> Router
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications/:application_id/collaborations",
            get(list_handler::<R, N>),
        )
        .route("/api/v1/collaborations", post(create_handler::<R, N>))
        .route(
            "/api/v1/collaborations/:id",
            get(get_handler::<R, N>)
                .patch(update_handler::<R, N>)
                .delete(delete_handler::<R, N>),
        )
        .route(
            "/api/v1/collaborations/:id/history",
            get(history_handler::<R, N>).post(add_history_handler::<R, N>),
        )
        .route(
            "/api/v1/collaborations/:id/invite",
            post(invite_handler::<R, N>),
        )
        .route(
            "/api/v1/collaborations/:id/invite/resend",
            post(resend_handler::<R, N>),
        )
        .route(
            "/api/v1/collaborations/:id/invite/schedule",
            post(schedule_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScheduleRequest {
    #[serde(deserialize_with = "dates::datetime")]
    scheduled_for: DateTime<Utc>,
}

fn owner(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(UserId)
        .ok_or_else(|| {
            let payload = json!({ "error": "missing or invalid x-user-id header" });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

pub(crate) async fn list_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(application_id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.list_for_application(ApplicationId(application_id), owner) {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    headers: HeaderMap,
    Json(input): Json<NewCollaboration>,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.create(owner, input) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.get(CollaborationId(id), owner) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(patch): Json<CollaborationPatch>,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.update(CollaborationId(id), owner, patch) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.delete(CollaborationId(id), owner) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn history_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.history(CollaborationId(id), owner) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn add_history_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(note): Json<HistoryNote>,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.add_history(CollaborationId(id), owner, note) {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn invite_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.send_invitation(CollaborationId(id), owner).await {
        Ok(invite) => (StatusCode::CREATED, Json(invite)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resend_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.resend_invitation(CollaborationId(id), owner).await {
        Ok(invite) => (StatusCode::OK, Json(invite)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn schedule_handler<R, N>(
    State(service): State<Arc<CollaborationService<R, N>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ScheduleRequest>,
) -> Response
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    let owner = match owner(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.schedule_invitation(CollaborationId(id), owner, request.scheduled_for) {
        Ok(invite) => (StatusCode::CREATED, Json(invite)).into_response(),
        Err(err) => err.into_response(),
    }
}
