use axum::{
    extract::{Extension, State},
    Json,
};

use crate::controllers::poll_controllers::models::{CreatePollRequest, PollResponse};
use crate::middleware::identity::require_user;
use crate::models::vote_models::VoterIdentity;
use crate::repo::NewPoll;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn create_poll(
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
    Json(payload): Json<CreatePollRequest>,
) -> AppResult<Json<PollResponse>> {
    let creator_id = require_user(identity.as_deref())?.to_string();

    let poll = state
        .repo
        .create_poll(
            NewPoll {
                title: payload.title,
                description: payload.description,
                poll_type: payload.poll_type,
                anonymous: payload.anonymous,
                guest_voting: payload.guest_voting,
                result_visibility: payload.result_visibility,
                show_results: payload.show_results,
                options: payload.options,
                starts_at: payload.starts_at,
                closes_at: payload.closes_at,
            },
            &creator_id,
        )
        .await?;

    let options = state.repo.get_options(&poll).await?;
    Ok(Json(PollResponse::from_parts(poll, options)))
}
