use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollType {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Draft,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultVisibility {
    Public,
    Private,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
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
    /// Option document ids in display order.
    pub option_ids: Vec<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollOption {
    #[serde(rename = "_id")]
    pub id: String,
    pub poll_id: String,
    pub text: String,
    pub order: u32,
    pub vote_count: i64,
    pub created_at: DateTime<Utc>,
}
