use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tokio::time::sleep;

use crate::models::poll_models::{Poll, PollOption, PollType};
use crate::models::vote_models::{Vote, VoterIdentity};
use crate::store::{
    from_doc, to_doc, DocKey, StoreError, TransactionalStore, WriteOp, OPTIONS, POLLS, VOTES,
};

pub mod eligibility;
pub mod results;

use eligibility::NotVotableReason;

/// Attempts before a contended cast is given up as `VoteError::Conflict`.
const MAX_CAST_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("poll not found")]
    PollNotFound,
    #[error("{0}")]
    PermissionDenied(String),
    #[error("poll is not accepting votes ({})", .0.as_str())]
    NotVotable(NotVotableReason),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("you have already voted on this poll")]
    AlreadyVoted,
    #[error("vote could not be committed under concurrent load")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deterministic vote document id. The derivation is the double-vote guard:
/// two attempts by the same voter on the same poll necessarily contend on the
/// same key, and the store rejects the second create. The exact format is
/// load-bearing for stored data compatibility.
pub fn derive_vote_id(poll_id: &str, voter: &VoterIdentity) -> String {
    match voter {
        VoterIdentity::User(user_id) => format!("{poll_id}_{user_id}"),
        VoterIdentity::Guest(guest_id) => format!("{poll_id}_guest_{guest_id}"),
    }
}

/// Owns vote-identity derivation, eligibility checks, and the atomic
/// cast-vote protocol. The only shared mutable state is the poll/option
/// counters and the derived-id vote namespace, both protected solely by the
/// store's optimistic transaction isolation.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn TransactionalStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Casts a vote as one atomic unit: exactly one new vote document, one
    /// poll counter increment and one increment per selected option, or
    /// nothing at all. Store-level optimistic conflicts are retried from the
    /// top with exponential backoff; application-level failures are not.
    pub async fn cast_vote(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
        option_ids: &[String],
        explicit_anonymous: bool,
    ) -> Result<Vote, VoteError> {
        let mut selection: Vec<String> = Vec::new();
        for id in option_ids {
            if !selection.contains(id) {
                selection.push(id.clone());
            }
        }
        if selection.is_empty() {
            return Err(VoteError::InvalidArgument(
                "at least one option must be selected".to_string(),
            ));
        }

        for attempt in 0..MAX_CAST_ATTEMPTS {
            match self
                .try_cast(poll_id, voter, &selection, explicit_anonymous)
                .await
            {
                Err(VoteError::Store(StoreError::Conflict)) => {
                    tracing::debug!(poll_id, attempt, "cast_vote conflict, retrying");
                    // Jitter desynchronizes losers that all observed the same
                    // conflicting commit, so retries do not collide again.
                    let backoff = RETRY_BASE_DELAY_MS << attempt;
                    let jitter = rand::thread_rng().gen_range(0..=backoff);
                    sleep(Duration::from_millis(backoff + jitter)).await;
                }
                other => return other,
            }
        }
        Err(VoteError::Conflict)
    }

    async fn try_cast(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
        selection: &[String],
        explicit_anonymous: bool,
    ) -> Result<Vote, VoteError> {
        let mut tx = self.store.begin().await?;

        let poll_key = DocKey::new(POLLS, poll_id);
        let vote_id = derive_vote_id(poll_id, voter);
        let vote_key = DocKey::new(VOTES, &vote_id);
        let mut keys = vec![poll_key.clone(), vote_key.clone()];
        keys.extend(selection.iter().map(|id| DocKey::new(OPTIONS, id)));

        let docs = tx.read_keys(&keys).await?;

        let poll: Poll = match docs.get(&poll_key) {
            Some(doc) => from_doc(doc.clone())?,
            None => return Err(VoteError::PollNotFound),
        };

        if voter.is_guest() && !poll.guest_voting {
            return Err(VoteError::PermissionDenied(
                "guest voting is disabled for this poll".to_string(),
            ));
        }

        eligibility::check_votable(&poll, Utc::now()).map_err(VoteError::NotVotable)?;

        if poll.poll_type == PollType::Single && selection.len() > 1 {
            return Err(VoteError::InvalidArgument(
                "single choice poll allows only one option".to_string(),
            ));
        }

        if docs.contains_key(&vote_key) {
            return Err(VoteError::AlreadyVoted);
        }

        for option_id in selection {
            let doc = docs
                .get(&DocKey::new(OPTIONS, option_id))
                .ok_or_else(|| VoteError::InvalidArgument("unknown option".to_string()))?;
            let option: PollOption = from_doc(doc.clone())?;
            if option.poll_id != poll.id {
                return Err(VoteError::InvalidArgument("unknown option".to_string()));
            }
        }

        let (user_id, guest_id) = match voter {
            VoterIdentity::User(id) => (Some(id.clone()), None),
            VoterIdentity::Guest(id) => (None, Some(id.clone())),
        };
        let vote = Vote {
            id: vote_id,
            poll_id: poll.id.clone(),
            user_id,
            guest_id,
            option_ids: selection.to_vec(),
            anonymous: explicit_anonymous || poll.anonymous,
            created_at: Utc::now(),
        };

        let mut writes = vec![
            WriteOp::Create {
                key: vote_key,
                doc: to_doc(&vote)?,
            },
            WriteOp::Increment {
                key: poll_key,
                field: "total_votes",
                by: 1,
            },
        ];
        writes.extend(selection.iter().map(|id| WriteOp::Increment {
            key: DocKey::new(OPTIONS, id),
            field: "vote_count",
            by: 1,
        }));

        tx.propose_writes(writes).await?;

        tracing::info!(poll_id, vote_id = %vote.id, "vote committed");
        Ok(vote)
    }

    /// Point lookup by derived id; no transaction needed.
    pub async fn get_vote(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
    ) -> Result<Option<Vote>, VoteError> {
        let key = DocKey::new(VOTES, derive_vote_id(poll_id, voter));
        match self.store.read_one(&key).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }
}
