//! Poll service.
//!
//! Inbound facade over the vote engine and chain manager. Every call runs
//! under a deadline; a call that overruns is dropped (rolling back any open
//! transaction) and reported as [`AppError::Timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pollchain_common::{AppError, AppResult, IdGenerator, Metrics, PollConfig, get_metrics};
use pollchain_db::{Ballot, ChoiceMap, NewPoll, PollKind, SharedPollStore, Tally};
use serde::Serialize;
use tracing::{error, info, warn};

use super::chain::PollChainManager;
use super::vote::VoteEngine;

/// Deadlines applied by [`PollService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Create, vote, read and delete.
    pub request: Duration,
    /// Successor creation after a closing vote.
    pub chain: Duration,
    /// Store health check.
    pub health: Duration,
}

impl From<&PollConfig> for Deadlines {
    fn from(config: &PollConfig) -> Self {
        Self {
            request: config.request_timeout(),
            chain: config.chain_timeout(),
            health: config.health_timeout(),
        }
    }
}

/// Input for creating a poll.
#[derive(Debug, Clone)]
pub struct CreatePollInput {
    pub title: String,
    pub kind: PollKind,
    pub target_votes: u32,
    pub choices: Vec<String>,
    pub auto_create: bool,
    /// Link the new poll as the successor of an existing one.
    pub previous_poll_id: Option<String>,
}

/// Result of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    /// Successor of the poll, when the poll is closed and chained.
    pub next_poll: Option<String>,
}

/// Full view of a poll.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub title: String,
    pub kind: PollKind,
    pub target_votes: u32,
    pub cast_votes: u32,
    pub auto_create: bool,
    pub created_at: DateTime<Utc>,
    pub choices: ChoiceMap,
    pub tally: Tally,
    pub next_poll: Option<String>,
    pub latest_poll: Option<String>,
}

/// Counters and immediate successor of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    pub target_votes: u32,
    pub cast_votes: u32,
    pub next_poll: Option<String>,
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    store: SharedPollStore,
    engine: VoteEngine,
    chain: PollChainManager,
    id_gen: IdGenerator,
    deadlines: Deadlines,
    metrics: Arc<Metrics>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(store: SharedPollStore, config: &PollConfig) -> Self {
        Self {
            engine: VoteEngine::new(store.clone(), config.vote_backoff()),
            chain: PollChainManager::new(store.clone()),
            store,
            id_gen: IdGenerator::new(),
            deadlines: Deadlines::from(config),
            metrics: get_metrics().clone(),
        }
    }

    /// Override the deadlines.
    #[must_use]
    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Report to the given metrics instead of the process-wide ones.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.engine = self.engine.with_metrics(metrics.clone());
        self.chain = self.chain.with_metrics(metrics.clone());
        self.metrics = metrics;
        self
    }

    /// Chain manager used by this service.
    #[must_use]
    pub const fn chain(&self) -> &PollChainManager {
        &self.chain
    }

    async fn with_deadline<T, F>(&self, limit: Duration, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        if let Ok(result) = tokio::time::timeout(limit, fut).await {
            result
        } else {
            self.metrics.record_timeout();
            warn!(operation, ?limit, "Operation deadline exceeded");
            Err(AppError::Timeout(format!("{operation} exceeded {limit:?}")))
        }
    }

    /// Create a poll and return its id.
    pub async fn create_poll(&self, input: CreatePollInput) -> AppResult<String> {
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Poll title cannot be empty".to_string()));
        }
        if input.choices.len() < 2 {
            return Err(AppError::Validation(
                "Poll must have at least 2 choices".to_string(),
            ));
        }
        if input.choices.iter().any(|c| c.trim().is_empty()) {
            return Err(AppError::Validation(
                "Poll choices cannot be empty".to_string(),
            ));
        }
        if input.target_votes < 1 {
            return Err(AppError::Validation(
                "Vote target must be at least 1".to_string(),
            ));
        }

        let poll = NewPoll {
            id: self.id_gen.generate(),
            title: input.title,
            kind: input.kind,
            target_votes: input.target_votes,
            choices: input.choices,
            auto_create: input.auto_create,
            // Blank means no predecessor
            predecessor_id: input
                .previous_poll_id
                .filter(|prev| !prev.trim().is_empty()),
        };

        self.with_deadline(self.deadlines.request, "create poll", self.store.create_poll(&poll))
            .await?;

        self.metrics.record_poll_created();
        info!(
            poll_id = %poll.id,
            kind = ?poll.kind,
            target_votes = poll.target_votes,
            predecessor = ?poll.predecessor_id,
            "Poll created"
        );
        Ok(poll.id)
    }

    /// Submit a vote, then spawn the successor if this closed an
    /// auto-create poll.
    ///
    /// A successor failure is reported as [`AppError::ChainSpawn`]; the vote
    /// itself stays recorded.
    pub async fn submit_vote(
        &self,
        poll_id: &str,
        voter: &str,
        choice_ids: Vec<i32>,
    ) -> AppResult<VoteReceipt> {
        if voter.trim().is_empty() {
            return Err(AppError::Validation("Voter id cannot be empty".to_string()));
        }

        let ballot = Ballot {
            poll_id: poll_id.to_string(),
            voter: voter.to_string(),
            choice_ids,
        };
        self.with_deadline(self.deadlines.request, "submit vote", self.engine.submit_vote(&ballot))
            .await?;

        match self
            .with_deadline(
                self.deadlines.chain,
                "spawn successor",
                self.chain.spawn_successor_if_due(poll_id),
            )
            .await
        {
            Ok(next_poll) => Ok(VoteReceipt { next_poll }),
            Err(e) => {
                error!(poll_id, error = %e, "Vote recorded but successor creation failed");
                Err(AppError::ChainSpawn(e.to_string()))
            }
        }
    }

    /// Delete a poll with its choices, votes and chain links.
    pub async fn delete_poll(&self, poll_id: &str) -> AppResult<()> {
        let removed = self
            .with_deadline(self.deadlines.request, "delete poll", self.store.delete_poll(poll_id))
            .await?;
        if !removed {
            return Err(AppError::NotFound(format!("Poll {poll_id}")));
        }
        self.metrics.record_poll_deleted();
        info!(poll_id, "Poll deleted");
        Ok(())
    }

    /// Summary, choices, tally and chain position of a poll.
    pub async fn read_poll_view(&self, poll_id: &str) -> AppResult<PollView> {
        self.with_deadline(self.deadlines.request, "read poll", async {
            let summary = self
                .store
                .read_poll_summary(poll_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Poll {poll_id}")))?;
            let choices = self.store.read_choices(poll_id).await?;
            let tally = self.store.read_vote_tally(poll_id).await?;
            let next_poll = self.chain.next_of(poll_id).await?;
            let latest_poll = self.chain.latest_of(poll_id).await?;

            Ok(PollView {
                title: summary.title,
                kind: summary.kind,
                target_votes: summary.target_votes,
                cast_votes: summary.cast_votes,
                auto_create: summary.auto_create,
                created_at: summary.created_at,
                choices,
                tally,
                next_poll,
                latest_poll,
            })
        })
        .await
    }

    /// Counters and immediate successor of a poll.
    pub async fn read_poll_status(&self, poll_id: &str) -> AppResult<PollStatus> {
        self.with_deadline(self.deadlines.request, "read poll status", async {
            let summary = self
                .store
                .read_poll_summary(poll_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Poll {poll_id}")))?;
            let next_poll = self.chain.next_of(poll_id).await?;

            Ok(PollStatus {
                target_votes: summary.target_votes,
                cast_votes: summary.cast_votes,
                next_poll,
            })
        })
        .await
    }

    /// Check that the store answers.
    pub async fn health_check(&self) -> AppResult<()> {
        self.with_deadline(self.deadlines.health, "health check", self.store.ping())
            .await
    }
}
