use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::poll_models::{Poll, PollOption, PollStatus, PollType};
use crate::store::{from_doc, DocKey, StoreError, TransactionalStore, OPTIONS, POLLS};

use super::{eligibility, VoteError};

#[derive(Debug, Clone, Serialize)]
pub struct OptionResult {
    pub id: String,
    pub text: String,
    pub vote_count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub poll_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    pub total_votes: i64,
    /// Computed with the same lazy-expiry predicate the ledger applies, so an
    /// active poll past its close time reads as no longer accepting votes.
    pub accepting_votes: bool,
    pub options: Vec<OptionResult>,
}

/// Structured export of a result snapshot (poll metadata + per-option rows).
#[derive(Debug, Clone, Serialize)]
pub struct ResultsExport {
    pub poll_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    pub total_votes: i64,
    pub exported_at: DateTime<Utc>,
    pub options: Vec<ExportRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    pub text: String,
    pub votes: i64,
    pub percentage: f64,
}

fn csv_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

impl PollResults {
    /// Flat tabular projection: `Option,Votes,Percentage` rows plus a total.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("Option,Votes,Percentage\n");
        for option in &self.options {
            csv.push_str(&format!(
                "{},{},{:.2}%\n",
                csv_quote(&option.text),
                option.vote_count,
                option.percentage
            ));
        }
        csv.push_str(&format!("\nTotal Votes,{},\n", self.total_votes));
        csv
    }

    pub fn to_export(&self, exported_at: DateTime<Utc>) -> ResultsExport {
        ResultsExport {
            poll_id: self.poll_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            poll_type: self.poll_type,
            status: self.status,
            total_votes: self.total_votes,
            exported_at,
            options: self
                .options
                .iter()
                .map(|option| ExportRow {
                    text: option.text.clone(),
                    votes: option.vote_count,
                    percentage: option.percentage,
                })
                .collect(),
        }
    }
}

/// Read-model over the denormalized counters the ledger maintains. Votes are
/// never rescanned; a snapshot read of poll + options is already consistent
/// because every counter mutation commits atomically with its vote document.
#[derive(Clone)]
pub struct ResultAggregator {
    store: Arc<dyn TransactionalStore>,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    pub async fn compute_results(&self, poll_id: &str) -> Result<PollResults, VoteError> {
        let poll: Poll = match self.store.read_one(&DocKey::new(POLLS, poll_id)).await? {
            Some(doc) => from_doc(doc)?,
            None => return Err(VoteError::PollNotFound),
        };

        let mut options = Vec::with_capacity(poll.option_ids.len());
        for option_id in &poll.option_ids {
            let doc = self
                .store
                .read_one(&DocKey::new(OPTIONS, option_id))
                .await?
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "poll {poll_id} references missing option {option_id}"
                    ))
                })?;
            let option: PollOption = from_doc(doc)?;
            let percentage = if poll.total_votes > 0 {
                100.0 * option.vote_count as f64 / poll.total_votes as f64
            } else {
                0.0
            };
            options.push(OptionResult {
                id: option.id,
                text: option.text,
                vote_count: option.vote_count,
                percentage,
            });
        }

        let accepting_votes = eligibility::accepting_votes(&poll, Utc::now());
        Ok(PollResults {
            poll_id: poll.id,
            title: poll.title,
            description: poll.description,
            poll_type: poll.poll_type,
            status: poll.status,
            total_votes: poll.total_votes,
            accepting_votes,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil::*;
    use crate::ledger::VoteLedger;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[tokio::test]
    async fn percentages_follow_the_counters() {
        let store = MemoryStore::new();
        let ledger = VoteLedger::new(Arc::new(store.clone()));
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let (poll, options) = seed(&store, base_poll("p1"), &["Red", "Blue"]).await;

        ledger
            .cast_vote(&poll.id, &guest("g1"), &options[..1].to_vec(), false)
            .await
            .unwrap();
        ledger
            .cast_vote(&poll.id, &user("u1"), &options[1..].to_vec(), false)
            .await
            .unwrap();

        let results = aggregator.compute_results(&poll.id).await.unwrap();
        assert_eq!(results.total_votes, 2);
        assert_eq!(results.options.len(), 2);
        assert_eq!(results.options[0].text, "Red");
        assert_eq!(results.options[0].vote_count, 1);
        assert_eq!(results.options[0].percentage, 50.0);
        assert_eq!(results.options[1].percentage, 50.0);
        assert!(results.accepting_votes);
    }

    #[tokio::test]
    async fn zero_votes_means_zero_percent() {
        let store = MemoryStore::new();
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let (poll, _) = seed(&store, base_poll("p1"), &["Red", "Blue"]).await;

        let results = aggregator.compute_results(&poll.id).await.unwrap();
        assert_eq!(results.total_votes, 0);
        assert!(results.options.iter().all(|o| o.percentage == 0.0));
    }

    #[tokio::test]
    async fn options_come_back_in_display_order() {
        let store = MemoryStore::new();
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let (poll, _) = seed(&store, base_poll("p1"), &["First", "Second", "Third"]).await;

        let results = aggregator.compute_results(&poll.id).await.unwrap();
        let texts: Vec<&str> = results.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn expired_poll_reads_as_not_accepting() {
        let store = MemoryStore::new();
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let mut poll = base_poll("p1");
        poll.closes_at = Some(Utc::now() - Duration::minutes(5));
        let (poll, _) = seed(&store, poll, &["Red", "Blue"]).await;

        let results = aggregator.compute_results(&poll.id).await.unwrap();
        // Lazy expiry: stored status is still `active`.
        assert_eq!(results.status, PollStatus::Active);
        assert!(!results.accepting_votes);
    }

    #[tokio::test]
    async fn missing_poll_is_not_found() {
        let store = MemoryStore::new();
        let aggregator = ResultAggregator::new(Arc::new(store));
        let err = aggregator.compute_results("nope").await.unwrap_err();
        assert!(matches!(err, VoteError::PollNotFound));
    }

    #[tokio::test]
    async fn csv_export_quotes_and_totals() {
        let store = MemoryStore::new();
        let ledger = VoteLedger::new(Arc::new(store.clone()));
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let (poll, options) =
            seed(&store, base_poll("p1"), &["Tea, \"Earl Grey\"", "Coffee"]).await;

        ledger
            .cast_vote(&poll.id, &user("u1"), &options[..1].to_vec(), false)
            .await
            .unwrap();

        let csv = aggregator.compute_results(&poll.id).await.unwrap().to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Option,Votes,Percentage"));
        assert_eq!(
            lines.next(),
            Some("\"Tea, \"\"Earl Grey\"\"\",1,100.00%")
        );
        assert_eq!(lines.next(), Some("\"Coffee\",0,0.00%"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("Total Votes,1,"));
    }

    #[tokio::test]
    async fn structured_export_carries_metadata() {
        let store = MemoryStore::new();
        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let mut poll = base_poll("p1");
        poll.description = Some("Pick one".to_string());
        let (poll, _) = seed(&store, poll, &["Red", "Blue"]).await;

        let results = aggregator.compute_results(&poll.id).await.unwrap();
        let exported_at = Utc::now();
        let export = results.to_export(exported_at);
        assert_eq!(export.poll_id, poll.id);
        assert_eq!(export.description.as_deref(), Some("Pick one"));
        assert_eq!(export.exported_at, exported_at);
        assert_eq!(export.options.len(), 2);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["options"][0]["votes"], 0);
    }
}
