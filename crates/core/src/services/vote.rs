//! Vote engine.

use std::collections::HashSet;
use std::sync::Arc;

use pollchain_common::{AppError, AppResult, Backoff, Metrics, Timer, get_metrics};
use pollchain_db::{Ballot, CastOutcome, SharedPollStore};
use tracing::{debug, info, warn};

/// Drives a ballot through bounded cast attempts.
///
/// Each attempt is one serializable transaction in the store. Only
/// [`CastOutcome::Conflict`] is retried; rejections are final. When every
/// attempt conflicts the vote fails with [`AppError::Overloaded`].
#[derive(Clone)]
pub struct VoteEngine {
    store: SharedPollStore,
    backoff: Backoff,
    metrics: Arc<Metrics>,
}

impl VoteEngine {
    /// Create a vote engine.
    #[must_use]
    pub fn new(store: SharedPollStore, backoff: Backoff) -> Self {
        Self {
            store,
            backoff,
            metrics: get_metrics().clone(),
        }
    }

    /// Report to the given metrics instead of the process-wide ones.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Submit a ballot.
    pub async fn submit_vote(&self, ballot: &Ballot) -> AppResult<()> {
        ensure_distinct(&ballot.choice_ids)?;

        let timer = Timer::start();
        for attempt in 0..self.backoff.max_attempts {
            match self.store.cast_vote(ballot).await? {
                CastOutcome::Accepted => {
                    self.metrics.record_vote_accepted(timer.elapsed());
                    info!(
                        poll_id = %ballot.poll_id,
                        voter = %ballot.voter,
                        choices = ballot.choice_ids.len(),
                        attempt = attempt + 1,
                        "Vote accepted"
                    );
                    return Ok(());
                }
                CastOutcome::Rejected(rejection) => {
                    self.metrics.record_vote_rejected();
                    debug!(
                        poll_id = %ballot.poll_id,
                        voter = %ballot.voter,
                        ?rejection,
                        "Vote rejected"
                    );
                    return Err(rejection.into());
                }
                CastOutcome::Conflict => {
                    self.metrics.record_vote_conflict();
                    let delay = self.backoff.budget_for_attempt(attempt);
                    debug!(
                        poll_id = %ballot.poll_id,
                        voter = %ballot.voter,
                        attempt = attempt + 1,
                        ?delay,
                        "Vote attempt conflicted"
                    );
                    if self.backoff.should_retry(attempt + 1) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.metrics.record_vote_overloaded();
        warn!(
            poll_id = %ballot.poll_id,
            voter = %ballot.voter,
            attempts = self.backoff.max_attempts,
            "Vote gave up after repeated conflicts"
        );
        Err(AppError::Overloaded)
    }
}

/// Reject empty and duplicate selections before touching the store.
fn ensure_distinct(choice_ids: &[i32]) -> AppResult<()> {
    if choice_ids.is_empty() {
        return Err(AppError::InvalidSelection(
            "At least one choice must be selected".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(choice_ids.len());
    if let Some(dup) = choice_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::InvalidSelection(format!(
            "Choice {dup} selected more than once"
        )));
    }
    Ok(())
}
