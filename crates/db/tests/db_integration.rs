//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `pollchain_test`)
//!   `TEST_DB_PASSWORD` (default: `pollchain_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pollchain_common::AppError;
use pollchain_db::test_utils::{TestDatabase, TestDbConfig};
use pollchain_db::{
    Ballot, CastOutcome, NewPoll, PollKind, PollRepository, PollStore, VoteRejection,
};

fn new_poll(id: &str, kind: PollKind, target: u32, predecessor: Option<&str>) -> NewPoll {
    NewPoll {
        id: id.to_string(),
        title: "Lunch".to_string(),
        kind,
        target_votes: target,
        choices: vec!["Pizza".to_string(), "Sushi".to_string(), "Tacos".to_string()],
        auto_create: true,
        predecessor_id: predecessor.map(str::to_string),
    }
}

fn ballot(poll_id: &str, voter: &str, choice_ids: Vec<i32>) -> Ballot {
    Ballot {
        poll_id: poll_id.to_string(),
        voter: voter.to_string(),
        choice_ids,
    }
}

/// Retry a cast until it settles, the way the vote engine does.
async fn cast_until_settled(repo: &PollRepository, ballot: &Ballot) -> CastOutcome {
    loop {
        match repo.cast_vote(ballot).await.unwrap() {
            CastOutcome::Conflict => tokio::task::yield_now().await,
            settled => return settled,
        }
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_multiple_choice_vote_counts_one_voter() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let repo = PollRepository::new(db.connection());

    repo.create_poll(&new_poll("p1", PollKind::Multiple, 2, None))
        .await
        .unwrap();
    let ids: Vec<i32> = repo.read_choices("p1").await.unwrap().into_keys().collect();

    let outcome = cast_until_settled(&repo, &ballot("p1", "alice", ids[..2].to_vec())).await;
    assert_eq!(outcome, CastOutcome::Accepted);

    let summary = repo.read_poll_summary("p1").await.unwrap().unwrap();
    assert_eq!(summary.cast_votes, 1);

    let tally = repo.read_vote_tally("p1").await.unwrap();
    assert_eq!(tally[&ids[0]], 1);
    assert_eq!(tally[&ids[1]], 1);
    assert_eq!(tally[&ids[2]], 0);

    let again = cast_until_settled(&repo, &ballot("p1", "alice", vec![ids[2]])).await;
    assert_eq!(again, CastOutcome::Rejected(VoteRejection::AlreadyVoted));

    drop(repo);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_votes_never_exceed_target() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let repo = PollRepository::new(db.connection());

    repo.create_poll(&new_poll("p1", PollKind::Single, 3, None))
        .await
        .unwrap();
    let choice = *repo.read_choices("p1").await.unwrap().keys().next().unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                cast_until_settled(&repo, &ballot("p1", &format!("voter{i}"), vec![choice])).await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CastOutcome::Accepted => accepted += 1,
            CastOutcome::Rejected(VoteRejection::VotingClosed) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(accepted, 3);
    let summary = repo.read_poll_summary("p1").await.unwrap().unwrap();
    assert_eq!(summary.cast_votes, 3);
    assert_eq!(repo.read_vote_tally("p1").await.unwrap()[&choice], 3);

    drop(repo);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_foreign_choice_rejected() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let repo = PollRepository::new(db.connection());

    repo.create_poll(&new_poll("p1", PollKind::Single, 2, None))
        .await
        .unwrap();
    repo.create_poll(&new_poll("p2", PollKind::Single, 2, None))
        .await
        .unwrap();
    let foreign = *repo.read_choices("p2").await.unwrap().keys().next().unwrap();

    let outcome = cast_until_settled(&repo, &ballot("p1", "alice", vec![foreign])).await;
    assert!(matches!(
        outcome,
        CastOutcome::Rejected(VoteRejection::InvalidSelection(_))
    ));

    drop(repo);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_chain_links_and_cascade_delete() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let repo = PollRepository::new(db.connection());

    repo.create_poll(&new_poll("p1", PollKind::Single, 1, None))
        .await
        .unwrap();
    repo.create_poll(&new_poll("p2", PollKind::Single, 1, Some("p1")))
        .await
        .unwrap();
    assert_eq!(
        repo.read_successor("p1").await.unwrap(),
        Some("p2".to_string())
    );

    let dangling = repo
        .create_poll(&new_poll("p3", PollKind::Single, 1, Some("missing")))
        .await;
    assert!(matches!(dangling, Err(AppError::PreviousPollNotFound(_))));
    assert!(repo.read_poll_summary("p3").await.unwrap().is_none());

    let second = repo
        .create_poll(&new_poll("p4", PollKind::Single, 1, Some("p1")))
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    assert!(repo.delete_poll("p2").await.unwrap());
    assert_eq!(repo.read_successor("p1").await.unwrap(), None);
    assert!(!repo.delete_poll("p2").await.unwrap());

    drop(repo);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_long_identifiers_are_stored() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let repo = PollRepository::new(db.connection());

    let long_id = "p".repeat(64);
    repo.create_poll(&new_poll(&long_id, PollKind::Single, 2, None))
        .await
        .unwrap();
    let choice = *repo.read_choices(&long_id).await.unwrap().keys().next().unwrap();

    let voter = "v".repeat(300);
    let outcome = cast_until_settled(&repo, &ballot(&long_id, &voter, vec![choice])).await;
    assert_eq!(outcome, CastOutcome::Accepted);

    let missing = "m".repeat(300);
    let dangling = repo
        .create_poll(&new_poll("p2", PollKind::Single, 1, Some(&missing)))
        .await;
    assert!(matches!(dangling, Err(AppError::PreviousPollNotFound(_))));

    drop(repo);
    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
}
