use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::{CastVoteRequest, PollResponse};
use crate::middleware::identity::require_identity;
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Casts the caller's vote and returns the poll with its updated counters.
/// The ledger performs the whole write as one atomic transaction; a duplicate
/// attempt always surfaces as 409 ALREADY_VOTED, never as a silent success.
pub async fn cast_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
    Json(payload): Json<CastVoteRequest>,
) -> AppResult<Json<PollResponse>> {
    let voter = require_identity(identity.as_deref())?;

    state
        .ledger
        .cast_vote(&poll_id, voter, &payload.option_ids, payload.anonymous)
        .await?;

    let poll = state
        .repo
        .get_poll(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;
    let options = state.repo.get_options(&poll).await?;
    Ok(Json(PollResponse::from_parts(poll, options)))
}
