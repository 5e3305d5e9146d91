use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::json;

use crate::middleware::identity::require_identity;
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Whether the caller has already voted on this poll, and for what. Clients
/// that time out during a cast must call this before retrying, so a
/// duplicate-submission ALREADY_VOTED is not mistaken for a failure.
pub async fn check_user_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<serde_json::Value>> {
    let voter = require_identity(identity.as_deref())?;

    match state.ledger.get_vote(&poll_id, voter).await? {
        Some(vote) => Ok(Json(json!({
            "has_voted": true,
            "option_ids": vote.option_ids,
            "anonymous": vote.anonymous,
            "created_at": vote.created_at,
        }))),
        None => Ok(Json(json!({
            "has_voted": false
        }))),
    }
}
