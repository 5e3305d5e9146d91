use axum::{
    extract::{Extension, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::middleware::identity::require_user;
use crate::models::vote_models::VoterIdentity;
use crate::repo::PollFilter;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Polls created by the authenticated caller, newest first.
pub async fn get_my_polls(
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let creator_id = require_user(identity.as_deref())?.to_string();

    let polls = state
        .repo
        .list_polls(&PollFilter {
            status: None,
            created_by: Some(creator_id),
        })
        .await?;

    let mut responses = Vec::with_capacity(polls.len());
    for poll in polls {
        let options = state.repo.get_options(&poll).await?;
        responses.push(PollResponse::from_parts(poll, options));
    }
    Ok(Json(responses))
}
