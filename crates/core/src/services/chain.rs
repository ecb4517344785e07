//! Poll chain manager.
//!
//! A poll created with auto-create gets a successor once it reaches its
//! target. Links form a forward, singly linked chain.

use std::collections::HashSet;
use std::sync::Arc;

use pollchain_common::{AppError, AppResult, IdGenerator, Metrics, get_metrics};
use pollchain_db::{ChoiceMap, NewPoll, PollKind, PollSummary, SharedPollStore};
use tracing::{debug, info};

/// Build the successor of a concluded poll.
///
/// The successor copies title, target, auto-create and choice labels (in
/// choice id order) and is always single-choice.
#[must_use]
pub fn derive_successor(
    id: String,
    predecessor_id: &str,
    summary: &PollSummary,
    choices: &ChoiceMap,
) -> NewPoll {
    NewPoll {
        id,
        title: summary.title.clone(),
        kind: PollKind::Single,
        target_votes: summary.target_votes,
        choices: choices.values().cloned().collect(),
        auto_create: summary.auto_create,
        predecessor_id: Some(predecessor_id.to_string()),
    }
}

/// Spawns successor polls and walks chain links.
#[derive(Clone)]
pub struct PollChainManager {
    store: SharedPollStore,
    id_gen: IdGenerator,
    metrics: Arc<Metrics>,
}

impl PollChainManager {
    /// Create a chain manager.
    #[must_use]
    pub fn new(store: SharedPollStore) -> Self {
        Self {
            store,
            id_gen: IdGenerator::new(),
            metrics: get_metrics().clone(),
        }
    }

    /// Report to the given metrics instead of the process-wide ones.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create the successor of `poll_id` if the poll is closed and
    /// auto-create is set. Returns the successor id, whether created now or
    /// already linked.
    pub async fn spawn_successor_if_due(&self, poll_id: &str) -> AppResult<Option<String>> {
        let Some(summary) = self.store.read_poll_summary(poll_id).await? else {
            debug!(poll_id, "Poll gone before successor check");
            return Ok(None);
        };
        if !summary.should_spawn_successor() {
            return Ok(None);
        }
        if let Some(existing) = self.store.read_successor(poll_id).await? {
            return Ok(Some(existing));
        }

        let choices = self.store.read_choices(poll_id).await?;
        let successor = derive_successor(self.id_gen.generate(), poll_id, &summary, &choices);

        match self.store.create_poll(&successor).await {
            Ok(()) => {
                self.metrics.record_successor(true);
                self.metrics.record_poll_created();
                info!(poll_id, next_poll = %successor.id, "Successor poll created");
                Ok(Some(successor.id))
            }
            // Another caller linked a successor first
            Err(AppError::Conflict(_)) => self.store.read_successor(poll_id).await,
            Err(AppError::PreviousPollNotFound(_)) => {
                debug!(poll_id, "Poll deleted before successor was linked");
                Ok(None)
            }
            Err(e) => {
                self.metrics.record_successor(false);
                Err(e)
            }
        }
    }

    /// Immediate successor.
    pub async fn next_of(&self, poll_id: &str) -> AppResult<Option<String>> {
        self.store.read_successor(poll_id).await
    }

    /// Last poll of the chain starting after `poll_id`, or `None` when
    /// `poll_id` has no successor.
    pub async fn latest_of(&self, poll_id: &str) -> AppResult<Option<String>> {
        let Some(mut current) = self.store.read_successor(poll_id).await? else {
            return Ok(None);
        };

        let mut visited = HashSet::from([poll_id.to_string()]);
        loop {
            if !visited.insert(current.clone()) {
                return Err(AppError::Internal(format!(
                    "Chain starting at {poll_id} loops back to {current}"
                )));
            }
            match self.store.read_successor(&current).await? {
                Some(next) => current = next,
                None => return Ok(Some(current)),
            }
        }
    }
}
