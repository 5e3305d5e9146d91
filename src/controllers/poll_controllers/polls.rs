use axum::{
    extract::{Query, State},
    Json,
};

use crate::controllers::poll_controllers::models::{ListPollsQuery, PollResponse};
use crate::repo::PollFilter;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn get_all_polls(
    State(state): State<AppState>,
    Query(query): Query<ListPollsQuery>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let polls = state
        .repo
        .list_polls(&PollFilter {
            status: query.status,
            created_by: None,
        })
        .await?;

    let mut responses = Vec::with_capacity(polls.len());
    for poll in polls {
        let options = state.repo.get_options(&poll).await?;
        responses.push(PollResponse::from_parts(poll, options));
    }
    Ok(Json(responses))
}
