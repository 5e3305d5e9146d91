use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::middleware::identity::require_user;
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn close_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<PollResponse>> {
    let caller_id = require_user(identity.as_deref())?.to_string();

    let poll = state.repo.close_poll(&poll_id, &caller_id).await?;
    let options = state.repo.get_options(&poll).await?;
    Ok(Json(PollResponse::from_parts(poll, options)))
}
