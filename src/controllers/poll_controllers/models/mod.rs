use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::eligibility;
use crate::models::poll_models::{Poll, PollOption, PollStatus, PollType, ResultVisibility};

fn default_true() -> bool {
    true
}

fn default_type() -> PollType {
    PollType::Single
}

fn default_visibility() -> ResultVisibility {
    ResultVisibility::Public
}

#[derive(Deserialize, Debug)]
pub struct CreatePollRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub poll_type: PollType,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub guest_voting: bool,
    #[serde(default = "default_visibility")]
    pub result_visibility: ResultVisibility,
    #[serde(default = "default_true")]
    pub show_results: bool,
    pub options: Vec<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
pub struct CastVoteRequest {
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct ListPollsQuery {
    pub status: Option<PollStatus>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct StatsQuery {
    pub scope: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct OptionResponse {
    pub id: String,
    pub text: String,
    pub order: u32,
    pub vote_count: i64,
}

#[derive(Serialize, Debug)]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    pub anonymous: bool,
    pub guest_voting: bool,
    pub result_visibility: ResultVisibility,
    pub show_results: bool,
    pub created_by: String,
    pub total_votes: i64,
    /// Evaluated with the lazy-expiry predicate at response time; may be
    /// false while the stored status is still `active`.
    pub accepting_votes: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub options: Vec<OptionResponse>,
}

impl PollResponse {
    pub fn from_parts(poll: Poll, options: Vec<PollOption>) -> Self {
        let accepting_votes = eligibility::accepting_votes(&poll, Utc::now());
        Self {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            poll_type: poll.poll_type,
            status: poll.status,
            anonymous: poll.anonymous,
            guest_voting: poll.guest_voting,
            result_visibility: poll.result_visibility,
            show_results: poll.show_results,
            created_by: poll.created_by,
            total_votes: poll.total_votes,
            accepting_votes,
            starts_at: poll.starts_at,
            closes_at: poll.closes_at,
            created_at: poll.created_at,
            updated_at: poll.updated_at,
            options: options
                .into_iter()
                .map(|option| OptionResponse {
                    id: option.id,
                    text: option.text,
                    order: option.order,
                    vote_count: option.vote_count,
                })
                .collect(),
        }
    }
}
