//! Poll store port.
//!
//! Everything the vote engine and chain manager need from persistence goes
//! through [`PollStore`]. The Postgres implementation lives in
//! [`crate::repositories::PollRepository`]; an in-memory implementation for
//! tests lives in [`crate::test_utils::MemoryPollStore`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pollchain_common::{AppError, AppResult};
use serde::Serialize;

use crate::entities::PollKind;

/// Choice id to label, ordered by id.
pub type ChoiceMap = BTreeMap<i32, String>;

/// Choice id to number of voters that selected it.
pub type Tally = BTreeMap<i32, u64>;

/// Shared handle to a poll store.
pub type SharedPollStore = Arc<dyn PollStore>;

/// A poll to be written, optionally linked to a predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub id: String,
    pub title: String,
    pub kind: PollKind,
    pub target_votes: u32,
    /// Choice labels in insertion order
    pub choices: Vec<String>,
    pub auto_create: bool,
    /// When set, a `predecessor -> id` chain link is written in the same
    /// transaction as the poll.
    pub predecessor_id: Option<String>,
}

/// Poll header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub title: String,
    pub kind: PollKind,
    pub cast_votes: u32,
    pub target_votes: u32,
    pub auto_create: bool,
    pub created_at: DateTime<Utc>,
}

impl PollSummary {
    /// A poll is closed once it has reached its target.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.cast_votes >= self.target_votes
    }

    /// Whether a successor should exist for this poll.
    #[must_use]
    pub const fn should_spawn_successor(&self) -> bool {
        self.auto_create && self.is_closed()
    }
}

/// One voting event: a voter selecting one or more choices of a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: String,
    pub voter: String,
    pub choice_ids: Vec<i32>,
}

/// Why a ballot was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteRejection {
    PollNotFound,
    VotingClosed,
    InvalidSelection(String),
    AlreadyVoted,
}

impl From<VoteRejection> for AppError {
    fn from(rejection: VoteRejection) -> Self {
        match rejection {
            VoteRejection::PollNotFound => Self::NotFound("Poll not found".to_string()),
            VoteRejection::VotingClosed => Self::VotingClosed,
            VoteRejection::InvalidSelection(msg) => Self::InvalidSelection(msg),
            VoteRejection::AlreadyVoted => Self::AlreadyVoted,
        }
    }
}

/// Result of a single cast attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    /// Ballot committed and the cast counter advanced by one.
    Accepted,
    /// Ballot refused; nothing was written.
    Rejected(VoteRejection),
    /// Transaction lost a serialization race; nothing was written and the
    /// attempt may be retried.
    Conflict,
}

/// Check a selection against the poll kind, before any choice ownership
/// check.
pub fn validate_selection(kind: PollKind, choice_ids: &[i32]) -> Result<(), VoteRejection> {
    if choice_ids.is_empty() {
        return Err(VoteRejection::InvalidSelection(
            "At least one choice must be selected".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(choice_ids.len());
    if !choice_ids.iter().all(|id| seen.insert(*id)) {
        return Err(VoteRejection::InvalidSelection(
            "Duplicate choices in selection".to_string(),
        ));
    }

    if kind == PollKind::Single && choice_ids.len() != 1 {
        return Err(VoteRejection::InvalidSelection(
            "Single-choice poll accepts exactly one choice".to_string(),
        ));
    }

    Ok(())
}

/// Convert a stored count to its unsigned form.
pub(crate) fn count_from_row(value: i32, field: &str) -> AppResult<u32> {
    u32::try_from(value).map_err(|_| AppError::Internal(format!("Negative {field}: {value}")))
}

/// Persistence operations over polls, choices, votes and chain links.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a poll, its choices and the optional predecessor link as one
    /// unit.
    async fn create_poll(&self, poll: &NewPoll) -> AppResult<()>;

    /// Read the poll header row.
    async fn read_poll_summary(&self, poll_id: &str) -> AppResult<Option<PollSummary>>;

    /// Read the poll's choices.
    async fn read_choices(&self, poll_id: &str) -> AppResult<ChoiceMap>;

    /// Per-choice voter counts. Every choice appears, with zero when unvoted.
    async fn read_vote_tally(&self, poll_id: &str) -> AppResult<Tally>;

    /// Immediate successor of a poll, if one was linked.
    async fn read_successor(&self, poll_id: &str) -> AppResult<Option<String>>;

    /// Delete a poll with its choices, votes and chain links. Returns
    /// whether a poll was removed.
    async fn delete_poll(&self, poll_id: &str) -> AppResult<bool>;

    /// Run one serializable cast attempt.
    async fn cast_vote(&self, ballot: &Ballot) -> AppResult<CastOutcome>;

    /// Liveness probe.
    async fn ping(&self) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(cast: u32, target: u32, auto_create: bool) -> PollSummary {
        PollSummary {
            title: "Lunch".to_string(),
            kind: PollKind::Single,
            cast_votes: cast,
            target_votes: target,
            auto_create,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_closed_at_target() {
        assert!(!summary(1, 2, true).is_closed());
        assert!(summary(2, 2, true).is_closed());
    }

    #[test]
    fn test_spawn_requires_auto_create_and_closed() {
        assert!(summary(2, 2, true).should_spawn_successor());
        assert!(!summary(2, 2, false).should_spawn_successor());
        assert!(!summary(1, 2, true).should_spawn_successor());
    }

    #[test]
    fn test_validate_selection_empty() {
        assert!(matches!(
            validate_selection(PollKind::Multiple, &[]),
            Err(VoteRejection::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_validate_selection_duplicates() {
        assert!(matches!(
            validate_selection(PollKind::Multiple, &[3, 4, 3]),
            Err(VoteRejection::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_validate_selection_single_kind() {
        assert!(validate_selection(PollKind::Single, &[7]).is_ok());
        assert!(matches!(
            validate_selection(PollKind::Single, &[7, 8]),
            Err(VoteRejection::InvalidSelection(_))
        ));
        assert!(validate_selection(PollKind::Multiple, &[7, 8]).is_ok());
    }

    #[test]
    fn test_rejection_maps_to_app_error() {
        assert!(matches!(
            AppError::from(VoteRejection::PollNotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(VoteRejection::AlreadyVoted),
            AppError::AlreadyVoted
        ));
        assert!(matches!(
            AppError::from(VoteRejection::VotingClosed),
            AppError::VotingClosed
        ));
    }

    #[test]
    fn test_count_from_row_rejects_negative() {
        assert_eq!(count_from_row(3, "cast_votes").ok(), Some(3));
        assert!(matches!(
            count_from_row(-1, "cast_votes"),
            Err(AppError::Internal(_))
        ));
    }
}
