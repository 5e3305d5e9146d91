use axum::{
    extract::{Extension, Query, State},
    Json,
};

use crate::controllers::poll_controllers::models::StatsQuery;
use crate::middleware::identity::require_user;
use crate::models::vote_models::VoterIdentity;
use crate::repo::PollStats;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// Dashboard statistics. Defaults to the caller's own polls; `?scope=all`
/// widens to every poll.
pub async fn poll_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<PollStats>> {
    let caller_id = require_user(identity.as_deref())?.to_string();

    let created_by = match query.scope.as_deref() {
        Some("all") => None,
        _ => Some(caller_id.as_str()),
    };
    let stats = state.repo.stats(created_by).await?;
    Ok(Json(stats))
}
