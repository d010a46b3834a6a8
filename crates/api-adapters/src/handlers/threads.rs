//! Thread lifecycle, membership and chat routes.

use axum::extract::State;
use axum::http::StatusCode;
use domains::{Thread, ThreadMessage};
use serde::Deserialize;
use services::{NewThread, SendMessage, ThreadAlert, ThreadDetail, ThreadPatch, ThreadQuery, UserInsights};
use uuid::Uuid;

use super::ActorBody;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Query(query): Query<ThreadQuery>) -> ApiResult<Json<Vec<Thread>>> {
    Ok(Json(state.services.threads.list(&query).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(cmd): Json<NewThread>,
) -> ApiResult<(StatusCode, Json<Thread>)> {
    let thread = state.services.threads.create(cmd).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ThreadDetail>> {
    Ok(Json(state.services.threads.get(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThreadBody {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub patch: ThreadPatch,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateThreadBody>,
) -> ApiResult<Json<Thread>> {
    Ok(Json(state.services.threads.update(id, body.user_id, body.patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> ApiResult<StatusCode> {
    state.services.threads.delete(id, body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn request_join(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Thread>> {
    Ok(Json(state.services.membership.request_join(id, body.user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRequestBody {
    pub user_id: Uuid,
    pub approve: bool,
    pub acting_user_id: Uuid,
}

pub async fn handle_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<HandleRequestBody>,
) -> ApiResult<Json<Thread>> {
    let thread = state
        .services
        .membership
        .handle_request(id, body.user_id, body.approve, body.acting_user_id)
        .await?;
    Ok(Json(thread))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(cmd): Json<SendMessage>,
) -> ApiResult<(StatusCode, Json<ThreadMessage>)> {
    let message = state.services.messaging.send_message(id, cmd).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    #[serde(default)]
    pub after: u64,
}

pub async fn messages_since(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Json<Vec<ThreadMessage>>> {
    Ok(Json(state.services.messaging.messages_since(id, query.after).await?))
}

pub async fn insights(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<Json<UserInsights>> {
    Ok(Json(state.services.threads.insights(user_id).await?))
}

pub async fn alerts(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<Json<Vec<ThreadAlert>>> {
    Ok(Json(state.services.expiry.alerts_for(user_id).await?))
}
