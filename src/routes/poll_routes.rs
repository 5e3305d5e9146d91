use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::controllers::poll_controllers::{
    cast_vote, check_vote, close_poll, create_poll, delete_poll, export_results, get_poll,
    get_results, get_user_polls, poll_stats, polls,
};
use crate::middleware::identity;
use crate::state::AppState;

pub fn poll_routes(state: AppState) -> Router {
    Router::new()
        .route("/create", post(create_poll::create_poll))
        .route("/", get(polls::get_all_polls))
        .route("/mine", get(get_user_polls::get_my_polls))
        .route("/stats", get(poll_stats::poll_stats))
        .route(
            "/:pollId",
            get(get_poll::get_poll).delete(delete_poll::delete_poll),
        )
        .route(
            "/:pollId/vote",
            post(cast_vote::cast_vote).get(check_vote::check_user_vote),
        )
        .route("/:pollId/close", post(close_poll::close_poll))
        .route("/:pollId/results", get(get_results::get_results))
        .route(
            "/:pollId/results/export",
            get(export_results::export_results),
        )
        .layer(from_fn(identity::attach_identity))
        .with_state(state)
}
