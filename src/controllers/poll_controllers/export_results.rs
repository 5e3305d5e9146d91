use axum::{
    extract::{Extension, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::controllers::poll_controllers::get_results::ensure_results_visible;
use crate::controllers::poll_controllers::models::ExportQuery;
use crate::models::vote_models::VoterIdentity;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Serializes a result snapshot as CSV (`?format=csv`) or structured JSON
/// (the default). A pure projection of the aggregator's output.
pub async fn export_results(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    identity: Option<Extension<VoterIdentity>>,
) -> AppResult<Response> {
    let poll = state
        .repo
        .get_poll(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    ensure_results_visible(&poll, identity.as_deref())?;

    let results = state.aggregator.compute_results(&poll_id).await?;

    match query.format.as_deref().unwrap_or("json") {
        "csv" => {
            let csv = results.to_csv();
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"poll-{}-results.csv\"", poll.id),
                ),
            ];
            Ok((headers, csv).into_response())
        }
        "json" => Ok(Json(results.to_export(Utc::now())).into_response()),
        other => Err(AppError::BadRequest(format!(
            "Unsupported export format: {other}"
        ))),
    }
}
