use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::json;

use crate::middleware::identity::require_user;
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Deletes the poll together with its options and votes.
pub async fn delete_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<serde_json::Value>> {
    let caller_id = require_user(identity.as_deref())?.to_string();

    state.repo.delete_poll(&poll_id, &caller_id).await?;
    Ok(Json(json!({ "deleted": true })))
}
