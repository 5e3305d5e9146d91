use axum::{
    extract::{Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

pub async fn get_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<PollResponse>> {
    let poll = state
        .repo
        .get_poll(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    let options = state.repo.get_options(&poll).await?;
    Ok(Json(PollResponse::from_parts(poll, options)))
}
