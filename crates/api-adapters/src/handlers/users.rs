use axum::extract::State;
use axum::http::StatusCode;
use domains::User;
use services::RegisterUser;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{Json, Path};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(cmd): Json<RegisterUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register(cmd).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<User>> {
    Ok(Json(state.services.users.get(id).await?))
}
