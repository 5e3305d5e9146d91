use std::sync::Arc;

use crate::ledger::{results::ResultAggregator, VoteLedger};
use crate::repo::PollRepository;
use crate::store::TransactionalStore;

#[derive(Clone)]
pub struct AppState {
    pub repo: PollRepository,
    pub ledger: VoteLedger,
    pub aggregator: ResultAggregator,
}

impl AppState {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self {
            repo: PollRepository::new(Arc::clone(&store)),
            ledger: VoteLedger::new(Arc::clone(&store)),
            aggregator: ResultAggregator::new(store),
        }
    }
}
