//! Poll repository.
//!
//! Postgres implementation of [`PollStore`]. A cast attempt runs in one
//! serializable transaction; losing a serialization race surfaces as
//! [`CastOutcome::Conflict`] and leaves nothing written.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pollchain_common::{AppError, AppResult};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    FromQueryResult, IsolationLevel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RuntimeErr, SqlErr, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, warn};

use crate::entities::{Choice, NextPoll, Poll, Vote, choice, next_poll, poll, vote};
use crate::store::{
    Ballot, CastOutcome, ChoiceMap, NewPoll, PollStore, PollSummary, Tally, VoteRejection,
    count_from_row, validate_selection,
};

/// SQLSTATE codes after which a transaction may be retried.
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn insert_poll(txn: &DatabaseTransaction, new: &NewPoll) -> AppResult<()> {
        let target_votes = i32::try_from(new.target_votes)
            .map_err(|_| AppError::Validation("Vote target is too large".to_string()))?;

        let model = poll::ActiveModel {
            id: Set(new.id.clone()),
            title: Set(new.title.clone()),
            kind: Set(new.kind),
            target_votes: Set(target_votes),
            cast_votes: Set(0),
            auto_create: Set(new.auto_create),
            created_at: Set(Utc::now().into()),
        };
        Poll::insert(model)
            .exec_without_returning(txn)
            .await
            .map_err(map_db_err)?;

        if let Some(predecessor) = &new.predecessor_id {
            let link = next_poll::ActiveModel {
                poll_id: Set(predecessor.clone()),
                next_poll_id: Set(new.id.clone()),
            };
            NextPoll::insert(link)
                .exec_without_returning(txn)
                .await
                .map_err(|e| match e.sql_err() {
                    Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                        AppError::PreviousPollNotFound(predecessor.clone())
                    }
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        AppError::Conflict(format!("Poll {predecessor} already has a successor"))
                    }
                    _ => map_db_err(e),
                })?;
        }

        let choices = new.choices.iter().map(|content| choice::ActiveModel {
            id: NotSet,
            poll_id: Set(new.id.clone()),
            content: Set(content.clone()),
        });
        Choice::insert_many(choices)
            .exec_without_returning(txn)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    /// Body of a cast attempt. Returns a non-accepted outcome without
    /// writing anything.
    async fn cast_in_txn(txn: &DatabaseTransaction, ballot: &Ballot) -> Result<CastOutcome, DbErr> {
        let Some(found) = Poll::find_by_id(&ballot.poll_id).one(txn).await? else {
            return Ok(CastOutcome::Rejected(VoteRejection::PollNotFound));
        };

        if found.cast_votes >= found.target_votes {
            return Ok(CastOutcome::Rejected(VoteRejection::VotingClosed));
        }

        if let Err(rejection) = validate_selection(found.kind, &ballot.choice_ids) {
            return Ok(CastOutcome::Rejected(rejection));
        }

        let owned = Choice::find()
            .filter(choice::Column::PollId.eq(ballot.poll_id.as_str()))
            .filter(choice::Column::Id.is_in(ballot.choice_ids.iter().copied()))
            .count(txn)
            .await?;
        if owned != ballot.choice_ids.len() as u64 {
            return Ok(CastOutcome::Rejected(VoteRejection::InvalidSelection(
                "Choice does not belong to this poll".to_string(),
            )));
        }

        let previous = Vote::find()
            .filter(vote::Column::PollId.eq(ballot.poll_id.as_str()))
            .filter(vote::Column::Voter.eq(ballot.voter.as_str()))
            .count(txn)
            .await?;
        if previous > 0 {
            return Ok(CastOutcome::Rejected(VoteRejection::AlreadyVoted));
        }

        let rows = ballot.choice_ids.iter().map(|choice_id| vote::ActiveModel {
            poll_id: Set(ballot.poll_id.clone()),
            voter: Set(ballot.voter.clone()),
            choice_id: Set(*choice_id),
        });
        Vote::insert_many(rows).exec_without_returning(txn).await?;

        // Guarded increment; never moves the counter past the target
        let updated = Poll::update_many()
            .col_expr(
                poll::Column::CastVotes,
                Expr::col(poll::Column::CastVotes).add(1),
            )
            .filter(poll::Column::Id.eq(ballot.poll_id.as_str()))
            .filter(Expr::col(poll::Column::CastVotes).lt(Expr::col(poll::Column::TargetVotes)))
            .exec(txn)
            .await?;
        if updated.rows_affected != 1 {
            return Ok(CastOutcome::Rejected(VoteRejection::VotingClosed));
        }

        Ok(CastOutcome::Accepted)
    }

    /// Turn a failed attempt into an outcome where the store semantics call
    /// for one.
    fn settle_cast_error(err: DbErr) -> AppResult<CastOutcome> {
        if is_serialization_failure(&err) {
            debug!(error = %err, "Vote transaction lost serialization race");
            return Ok(CastOutcome::Conflict);
        }
        match err.sql_err() {
            // A concurrent attempt by the same voter committed first
            Some(SqlErr::UniqueConstraintViolation(_)) => Ok(CastOutcome::Conflict),
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => Ok(CastOutcome::Rejected(
                VoteRejection::InvalidSelection("Choice does not belong to this poll".to_string()),
            )),
            _ => Err(map_db_err(err)),
        }
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        warn!(error = %e, "Failed to roll back transaction");
    }
}

/// Whether the error is a serialization failure or deadlock.
#[must_use]
pub fn is_serialization_failure(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db)) => db
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}

/// Map a database error to the application error space.
#[must_use]
pub fn map_db_err(err: DbErr) -> AppError {
    match err {
        DbErr::Conn(e) => AppError::Unavailable(e.to_string()),
        DbErr::ConnectionAcquire(e) => AppError::Unavailable(e.to_string()),
        other => AppError::Database(other.to_string()),
    }
}

#[derive(Debug, FromQueryResult)]
struct ChoiceVotes {
    choice_id: i32,
    votes: i64,
}

#[async_trait]
impl PollStore for PollRepository {
    async fn create_poll(&self, new: &NewPoll) -> AppResult<()> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        if let Err(e) = Self::insert_poll(&txn, new).await {
            rollback(txn).await;
            return Err(e);
        }
        txn.commit().await.map_err(map_db_err)?;
        debug!(poll_id = %new.id, predecessor = ?new.predecessor_id, "Poll created");
        Ok(())
    }

    async fn read_poll_summary(&self, poll_id: &str) -> AppResult<Option<PollSummary>> {
        let Some(found) = Poll::find_by_id(poll_id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?
        else {
            return Ok(None);
        };

        Ok(Some(PollSummary {
            cast_votes: count_from_row(found.cast_votes, "cast_votes")?,
            target_votes: count_from_row(found.target_votes, "target_votes")?,
            title: found.title,
            kind: found.kind,
            auto_create: found.auto_create,
            created_at: found.created_at.with_timezone(&Utc),
        }))
    }

    async fn read_choices(&self, poll_id: &str) -> AppResult<ChoiceMap> {
        let rows = Choice::find()
            .filter(choice::Column::PollId.eq(poll_id))
            .order_by_asc(choice::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(rows.into_iter().map(|c| (c.id, c.content)).collect())
    }

    async fn read_vote_tally(&self, poll_id: &str) -> AppResult<Tally> {
        let mut tally: Tally = self
            .read_choices(poll_id)
            .await?
            .into_keys()
            .map(|id| (id, 0))
            .collect();

        let counts = Vote::find()
            .select_only()
            .column(vote::Column::ChoiceId)
            .column_as(vote::Column::Voter.count(), "votes")
            .filter(vote::Column::PollId.eq(poll_id))
            .group_by(vote::Column::ChoiceId)
            .into_model::<ChoiceVotes>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        for row in counts {
            let votes = u64::try_from(row.votes)
                .map_err(|_| AppError::Internal(format!("Negative vote count: {}", row.votes)))?;
            tally.insert(row.choice_id, votes);
        }

        Ok(tally)
    }

    async fn read_successor(&self, poll_id: &str) -> AppResult<Option<String>> {
        Ok(NextPoll::find_by_id(poll_id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .map(|link| link.next_poll_id))
    }

    async fn delete_poll(&self, poll_id: &str) -> AppResult<bool> {
        // Choices, votes and links in either direction go with the poll
        let result = Poll::delete_by_id(poll_id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn cast_vote(&self, ballot: &Ballot) -> AppResult<CastOutcome> {
        let txn = match self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
        {
            Ok(txn) => txn,
            Err(e) => return Self::settle_cast_error(e),
        };

        match Self::cast_in_txn(&txn, ballot).await {
            Ok(CastOutcome::Accepted) => match txn.commit().await {
                Ok(()) => Ok(CastOutcome::Accepted),
                Err(e) => Self::settle_cast_error(e),
            },
            Ok(outcome) => {
                rollback(txn).await;
                Ok(outcome)
            }
            Err(e) => {
                rollback(txn).await;
                Self::settle_cast_error(e)
            }
        }
    }

    async fn ping(&self) -> AppResult<()> {
        self.db
            .ping()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))
    }
}
