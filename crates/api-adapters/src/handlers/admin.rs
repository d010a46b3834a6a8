use axum::extract::State;
use services::AdminDashboard;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{Json, Path};
use crate::state::AppState;

pub async fn dashboard(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<Json<AdminDashboard>> {
    Ok(Json(state.services.admin.dashboard(user_id).await?))
}
