use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_bson, Bson};
use serde::Serialize;
use uuid::Uuid;

use crate::models::poll_models::{Poll, PollOption, PollStatus, PollType, ResultVisibility};
use crate::store::{
    from_doc, to_doc, DocKey, TransactionalStore, WriteOp, OPTIONS, POLLS, VOTES,
};
use crate::utils::error::{AppError, AppResult};

/// Creation parameters for a poll; options are raw display texts.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub title: String,
    pub description: Option<String>,
    pub poll_type: PollType,
    pub anonymous: bool,
    pub guest_voting: bool,
    pub result_visibility: ResultVisibility,
    pub show_results: bool,
    pub options: Vec<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone)]
pub struct PollFilter {
    pub status: Option<PollStatus>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PollStats {
    pub total_polls: usize,
    pub active_polls: usize,
    pub closed_polls: usize,
    pub draft_polls: usize,
    pub total_votes: i64,
}

/// Thin CRUD boundary over poll and option documents. Vote-related writes
/// never go through here; the ledger composes its own counter increments into
/// its transaction.
#[derive(Clone)]
pub struct PollRepository {
    store: Arc<dyn TransactionalStore>,
}

impl PollRepository {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Creates the poll and its option documents as one batch. Status derives
    /// from the start time: `draft` while it lies in the future, else
    /// `active`.
    pub async fn create_poll(&self, input: NewPoll, creator_id: &str) -> AppResult<Poll> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::ValidationError("Poll title is required".to_string()));
        }

        let texts: Vec<String> = input
            .options
            .iter()
            .map(|opt| opt.trim().to_string())
            .filter(|opt| !opt.is_empty())
            .collect();

        let mut deduped = Vec::new();
        for text in &texts {
            if !deduped.contains(text) {
                deduped.push(text.clone());
            }
        }
        if deduped.len() < 2 {
            return Err(AppError::ValidationError(
                "Poll must have at least 2 unique options".to_string(),
            ));
        }
        if deduped.len() != texts.len() {
            return Err(AppError::ValidationError(
                "Poll options must be unique".to_string(),
            ));
        }

        if let (Some(starts_at), Some(closes_at)) = (input.starts_at, input.closes_at) {
            if closes_at <= starts_at {
                return Err(AppError::ValidationError(
                    "Poll close time must be after its start time".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let status = match input.starts_at {
            Some(starts_at) if starts_at > now => PollStatus::Draft,
            _ => PollStatus::Active,
        };

        let poll_id = Uuid::new_v4().to_string();
        let mut writes = Vec::with_capacity(deduped.len() + 1);
        let mut option_ids = Vec::with_capacity(deduped.len());
        for (order, text) in deduped.into_iter().enumerate() {
            let option = PollOption {
                id: Uuid::new_v4().to_string(),
                poll_id: poll_id.clone(),
                text,
                order: order as u32,
                vote_count: 0,
                created_at: now,
            };
            option_ids.push(option.id.clone());
            writes.push(WriteOp::Create {
                key: DocKey::new(OPTIONS, &option.id),
                doc: to_doc(&option)?,
            });
        }

        let poll = Poll {
            id: poll_id,
            title,
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            poll_type: input.poll_type,
            status,
            anonymous: input.anonymous,
            guest_voting: input.guest_voting,
            result_visibility: input.result_visibility,
            show_results: input.show_results,
            created_by: creator_id.to_string(),
            total_votes: 0,
            option_ids,
            starts_at: input.starts_at,
            closes_at: input.closes_at,
            created_at: now,
            updated_at: now,
        };
        writes.push(WriteOp::Create {
            key: DocKey::new(POLLS, &poll.id),
            doc: to_doc(&poll)?,
        });

        self.store.apply(writes).await?;
        tracing::info!(poll_id = %poll.id, creator = creator_id, "poll created");
        Ok(poll)
    }

    pub async fn get_poll(&self, poll_id: &str) -> AppResult<Option<Poll>> {
        match self.store.read_one(&DocKey::new(POLLS, poll_id)).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Options in display order (the order recorded on the poll document).
    pub async fn get_options(&self, poll: &Poll) -> AppResult<Vec<PollOption>> {
        let mut options = Vec::with_capacity(poll.option_ids.len());
        for option_id in &poll.option_ids {
            let doc = self
                .store
                .read_one(&DocKey::new(OPTIONS, option_id))
                .await?
                .ok_or_else(|| {
                    AppError::DatabaseError(format!(
                        "poll {} references missing option {}",
                        poll.id, option_id
                    ))
                })?;
            options.push(from_doc(doc)?);
        }
        Ok(options)
    }

    /// Polls matching the filter, newest first.
    pub async fn list_polls(&self, filter: &PollFilter) -> AppResult<Vec<Poll>> {
        let mut polls: Vec<Poll> = self
            .store
            .scan(POLLS)
            .await?
            .into_iter()
            .map(from_doc)
            .collect::<Result<_, _>>()?;
        polls.retain(|poll| {
            filter.status.map_or(true, |status| poll.status == status)
                && filter
                    .created_by
                    .as_deref()
                    .map_or(true, |creator| poll.created_by == creator)
        });
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    /// Explicit close by the creator. The only path that persists
    /// `status = closed`; time-window expiry never writes.
    pub async fn close_poll(&self, poll_id: &str, caller_id: &str) -> AppResult<Poll> {
        let poll = self
            .get_poll(poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if poll.created_by != caller_id {
            return Err(AppError::Forbidden(
                "Only the creator of the poll can close it".to_string(),
            ));
        }

        let now = Utc::now();
        self.store
            .apply(vec![WriteOp::Update {
                key: DocKey::new(POLLS, poll_id),
                fields: doc! {
                    "status": "closed",
                    "updated_at": to_bson(&now).map_err(|e| AppError::SerializationError(e.to_string()))?,
                },
            }])
            .await?;

        tracing::info!(poll_id, "poll closed");
        Ok(Poll {
            status: PollStatus::Closed,
            updated_at: now,
            ..poll
        })
    }

    /// Deletes the poll with its options and votes. A single batch of
    /// independently-idempotent deletes; no cross-document isolation needed.
    pub async fn delete_poll(&self, poll_id: &str, caller_id: &str) -> AppResult<()> {
        let poll = self
            .get_poll(poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if poll.created_by != caller_id {
            return Err(AppError::Forbidden(
                "Only the creator of the poll can delete it".to_string(),
            ));
        }

        let mut writes: Vec<WriteOp> = poll
            .option_ids
            .iter()
            .map(|option_id| WriteOp::Delete {
                key: DocKey::new(OPTIONS, option_id),
            })
            .collect();

        for vote_doc in self
            .store
            .find_eq(VOTES, "poll_id", Bson::String(poll_id.to_string()))
            .await?
        {
            let vote_id = vote_doc
                .get_str("_id")
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
            writes.push(WriteOp::Delete {
                key: DocKey::new(VOTES, vote_id),
            });
        }

        writes.push(WriteOp::Delete {
            key: DocKey::new(POLLS, poll_id),
        });

        self.store.apply(writes).await?;
        tracing::info!(poll_id, "poll deleted with options and votes");
        Ok(())
    }

    /// Dashboard statistics, optionally scoped to one creator.
    pub async fn stats(&self, created_by: Option<&str>) -> AppResult<PollStats> {
        let filter = PollFilter {
            status: None,
            created_by: created_by.map(str::to_string),
        };
        let polls = self.list_polls(&filter).await?;
        Ok(PollStats {
            total_polls: polls.len(),
            active_polls: polls
                .iter()
                .filter(|p| p.status == PollStatus::Active)
                .count(),
            closed_polls: polls
                .iter()
                .filter(|p| p.status == PollStatus::Closed)
                .count(),
            draft_polls: polls
                .iter()
                .filter(|p| p.status == PollStatus::Draft)
                .count(),
            total_votes: polls.iter().map(|p| p.total_votes).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil::{guest, seed, user};
    use crate::ledger::VoteLedger;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn new_poll(options: &[&str]) -> NewPoll {
        NewPoll {
            title: "Lunch spot".to_string(),
            description: None,
            poll_type: PollType::Single,
            anonymous: false,
            guest_voting: true,
            result_visibility: ResultVisibility::Public,
            show_results: true,
            options: options.iter().map(|s| s.to_string()).collect(),
            starts_at: None,
            closes_at: None,
        }
    }

    fn repo() -> (MemoryStore, PollRepository) {
        let store = MemoryStore::new();
        let repo = PollRepository::new(Arc::new(store.clone()));
        (store, repo)
    }

    #[tokio::test]
    async fn create_writes_poll_and_ordered_options() {
        let (_, repo) = repo();
        let poll = repo
            .create_poll(new_poll(&["Sushi", "Tacos", "Ramen"]), "u1")
            .await
            .unwrap();
        assert_eq!(poll.status, PollStatus::Active);
        assert_eq!(poll.option_ids.len(), 3);

        let options = repo.get_options(&poll).await.unwrap();
        let texts: Vec<&str> = options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Sushi", "Tacos", "Ramen"]);
        assert!(options.iter().enumerate().all(|(i, o)| o.order == i as u32));
    }

    #[tokio::test]
    async fn create_with_future_start_is_draft() {
        let (_, repo) = repo();
        let mut input = new_poll(&["A", "B"]);
        input.starts_at = Some(Utc::now() + Duration::hours(1));
        let poll = repo.create_poll(input, "u1").await.unwrap();
        assert_eq!(poll.status, PollStatus::Draft);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let (_, repo) = repo();

        let mut blank_title = new_poll(&["A", "B"]);
        blank_title.title = "   ".to_string();
        assert!(matches!(
            repo.create_poll(blank_title, "u1").await.unwrap_err(),
            AppError::ValidationError(_)
        ));

        assert!(matches!(
            repo.create_poll(new_poll(&["Only"]), "u1").await.unwrap_err(),
            AppError::ValidationError(_)
        ));

        assert!(matches!(
            repo.create_poll(new_poll(&["A", "A", "B"]), "u1")
                .await
                .unwrap_err(),
            AppError::ValidationError(_)
        ));

        let mut inverted_window = new_poll(&["A", "B"]);
        inverted_window.starts_at = Some(Utc::now() + Duration::hours(2));
        inverted_window.closes_at = Some(Utc::now() + Duration::hours(1));
        assert!(matches!(
            repo.create_poll(inverted_window, "u1").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn close_is_creator_only_and_preserves_counters() {
        let (store, repo) = repo();
        let poll = repo.create_poll(new_poll(&["A", "B"]), "u1").await.unwrap();

        let ledger = VoteLedger::new(Arc::new(store.clone()));
        ledger
            .cast_vote(&poll.id, &guest("g1"), &poll.option_ids[..1].to_vec(), false)
            .await
            .unwrap();

        assert!(matches!(
            repo.close_poll(&poll.id, "intruder").await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        let closed = repo.close_poll(&poll.id, "u1").await.unwrap();
        assert_eq!(closed.status, PollStatus::Closed);

        let reread = repo.get_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(reread.status, PollStatus::Closed);
        assert_eq!(reread.total_votes, 1);
    }

    #[tokio::test]
    async fn delete_cascades_to_options_and_votes() {
        let (store, repo) = repo();
        let poll = repo.create_poll(new_poll(&["A", "B"]), "u1").await.unwrap();
        let ledger = VoteLedger::new(Arc::new(store.clone()));
        ledger
            .cast_vote(&poll.id, &user("v1"), &poll.option_ids[..1].to_vec(), false)
            .await
            .unwrap();

        assert!(matches!(
            repo.delete_poll(&poll.id, "intruder").await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        repo.delete_poll(&poll.id, "u1").await.unwrap();
        assert!(repo.get_poll(&poll.id).await.unwrap().is_none());
        assert!(store.scan(OPTIONS).await.unwrap().is_empty());
        assert!(store.scan(VOTES).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_and_sorts_newest_first() {
        let (store, repo) = repo();
        let first = repo.create_poll(new_poll(&["A", "B"]), "u1").await.unwrap();
        let second = repo.create_poll(new_poll(&["C", "D"]), "u2").await.unwrap();
        repo.close_poll(&second.id, "u2").await.unwrap();

        // Backdate the first poll so ordering is deterministic.
        let backdated = Utc::now() - Duration::hours(1);
        store
            .apply(vec![WriteOp::Update {
                key: DocKey::new(POLLS, &first.id),
                fields: doc! { "created_at": to_bson(&backdated).unwrap() },
            }])
            .await
            .unwrap();

        let all = repo.list_polls(&PollFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let closed_only = repo
            .list_polls(&PollFilter {
                status: Some(PollStatus::Closed),
                created_by: None,
            })
            .await
            .unwrap();
        assert_eq!(closed_only.len(), 1);
        assert_eq!(closed_only[0].id, second.id);

        let by_creator = repo
            .list_polls(&PollFilter {
                status: None,
                created_by: Some("u1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(by_creator.len(), 1);
        assert_eq!(by_creator[0].id, first.id);
    }

    #[tokio::test]
    async fn stats_count_by_status_and_sum_votes() {
        let (store, repo) = repo();
        let active = repo.create_poll(new_poll(&["A", "B"]), "u1").await.unwrap();
        let closed = repo.create_poll(new_poll(&["C", "D"]), "u1").await.unwrap();
        repo.close_poll(&closed.id, "u1").await.unwrap();
        let mut scheduled = new_poll(&["E", "F"]);
        scheduled.starts_at = Some(Utc::now() + Duration::hours(1));
        repo.create_poll(scheduled, "other").await.unwrap();

        let ledger = VoteLedger::new(Arc::new(store.clone()));
        ledger
            .cast_vote(&active.id, &guest("g1"), &active.option_ids[..1].to_vec(), false)
            .await
            .unwrap();

        let mine = repo.stats(Some("u1")).await.unwrap();
        assert_eq!(mine.total_polls, 2);
        assert_eq!(mine.active_polls, 1);
        assert_eq!(mine.closed_polls, 1);
        assert_eq!(mine.draft_polls, 0);
        assert_eq!(mine.total_votes, 1);

        let everyone = repo.stats(None).await.unwrap();
        assert_eq!(everyone.total_polls, 3);
        assert_eq!(everyone.draft_polls, 1);
    }

    #[tokio::test]
    async fn seeded_and_created_polls_share_one_schema() {
        // The test seeding helper and the repository must stay in sync on the
        // stored document shape.
        let (store, repo) = repo();
        let (seeded, _) = seed(&store, crate::ledger::testutil::base_poll("s1"), &["A", "B"]).await;
        let reread = repo.get_poll(&seeded.id).await.unwrap().unwrap();
        assert_eq!(reread.title, seeded.title);
        assert_eq!(reread.option_ids, seeded.option_ids);
    }
}
