use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is casting the vote: an authenticated user id from the identity
/// provider, or a client-generated guest token. Guest tokens are only a
/// convenience double-vote deterrent, not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoterIdentity {
    User(String),
    Guest(String),
}

impl VoterIdentity {
    pub fn is_guest(&self) -> bool {
        matches!(self, VoterIdentity::Guest(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            VoterIdentity::User(id) => Some(id),
            VoterIdentity::Guest(_) => None,
        }
    }
}

/// Immutable record binding one voter identity to a poll and its chosen
/// option(s). The `_id` is derived from poll + voter (see
/// `ledger::derive_vote_id`), which is itself the double-vote guard.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: String,

    pub poll_id: String,

    pub user_id: Option<String>,

    pub guest_id: Option<String>,

    pub option_ids: Vec<String>,

    pub anonymous: bool,

    pub created_at: DateTime<Utc>,
}
