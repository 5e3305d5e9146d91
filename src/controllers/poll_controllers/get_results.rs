use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;

use crate::ledger::eligibility;
use crate::ledger::results::PollResults;
use crate::models::poll_models::{Poll, ResultVisibility};
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Result-visibility gate shared by the results and export endpoints. The
/// creator always sees their own tallies.
pub fn ensure_results_visible(
    poll: &Poll,
    identity: Option<&VoterIdentity>,
) -> Result<(), AppError> {
    let is_creator = identity
        .and_then(|i| i.user_id())
        .is_some_and(|id| id == poll.created_by);
    if is_creator {
        return Ok(());
    }

    if poll.result_visibility == ResultVisibility::Private {
        return Err(AppError::Forbidden(
            "Results of this poll are private".to_string(),
        ));
    }
    if !poll.show_results && eligibility::accepting_votes(poll, Utc::now()) {
        return Err(AppError::Forbidden(
            "Results are hidden until the poll closes".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_results(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Json<PollResults>> {
    let poll = state
        .repo
        .get_poll(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    ensure_results_visible(&poll, identity.as_deref())?;

    let results = state.aggregator.compute_results(&poll_id).await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil::{base_poll, guest, user};
    use crate::models::poll_models::PollStatus;
    use chrono::Duration;

    #[test]
    fn creator_always_sees_results() {
        let mut poll = base_poll("p1");
        poll.result_visibility = ResultVisibility::Private;
        poll.show_results = false;
        let creator = user("creator");
        assert!(ensure_results_visible(&poll, Some(&creator)).is_ok());
    }

    #[test]
    fn private_results_are_creator_only() {
        let mut poll = base_poll("p1");
        poll.result_visibility = ResultVisibility::Private;
        let other = user("someone-else");
        assert!(matches!(
            ensure_results_visible(&poll, Some(&other)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_results_visible(&poll, Some(&guest("g1"))),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_results_visible(&poll, None),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn hidden_results_stay_hidden_while_voting_is_open() {
        let mut poll = base_poll("p1");
        poll.show_results = false;
        let other = user("someone-else");
        assert!(matches!(
            ensure_results_visible(&poll, Some(&other)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn hidden_results_open_up_once_voting_stops() {
        let mut expired = base_poll("p1");
        expired.show_results = false;
        expired.closes_at = Some(Utc::now() - Duration::hours(1));
        let other = user("someone-else");
        assert!(ensure_results_visible(&expired, Some(&other)).is_ok());

        let mut closed = base_poll("p2");
        closed.show_results = false;
        closed.status = PollStatus::Closed;
        assert!(ensure_results_visible(&closed, Some(&other)).is_ok());
        assert!(ensure_results_visible(&closed, None).is_ok());
    }

    #[test]
    fn public_shown_results_need_no_identity() {
        let poll = base_poll("p1");
        assert!(ensure_results_visible(&poll, None).is_ok());
    }
}
