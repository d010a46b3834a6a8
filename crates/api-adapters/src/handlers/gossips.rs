//! Gossip board routes.

use axum::extract::State;
use axum::http::StatusCode;
use domains::{CommentReport, GossipComment, VoteType, Votes};
use serde::{Deserialize, Serialize};
use services::{GossipSort, GossipView, NewComment, NewGossip, ReportComment};
use uuid::Uuid;

use super::ActorBody;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub sort: GossipSort,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<GossipView>>> {
    Ok(Json(state.services.gossips.list(query.sort).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(cmd): Json<NewGossip>,
) -> ApiResult<(StatusCode, Json<GossipView>)> {
    let gossip = state.services.gossips.create(cmd).await?;
    Ok((StatusCode::CREATED, Json(gossip)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<GossipView>> {
    Ok(Json(state.services.gossips.get(id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> ApiResult<StatusCode> {
    state.services.gossips.delete(id, body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    pub user_id: Uuid,
    #[serde(alias = "vote")]
    pub vote_type: VoteType,
}

pub async fn vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VoteBody>,
) -> ApiResult<Json<Votes>> {
    Ok(Json(state.services.gossips.vote(id, body.user_id, body.vote_type).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(cmd): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<GossipComment>)> {
    let comment = state.services.gossips.add_comment(id, cmd).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: usize,
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ActorBody>,
) -> ApiResult<Json<Removed>> {
    let removed = state
        .services
        .gossips
        .delete_comment(id, comment_id, body.user_id)
        .await?;
    Ok(Json(Removed { removed }))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<VoteBody>,
) -> ApiResult<Json<Votes>> {
    let votes = state
        .services
        .gossips
        .vote_comment(id, comment_id, body.user_id, body.vote_type)
        .await?;
    Ok(Json(votes))
}

pub async fn report_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(cmd): Json<ReportComment>,
) -> ApiResult<(StatusCode, Json<CommentReport>)> {
    let report = state.services.gossips.report_comment(id, comment_id, cmd).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
