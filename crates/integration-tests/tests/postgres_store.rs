//! Integration tests for the `PostgreSQL` store.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `FIT_BATTLER_TEST_DATABASE_URL` pointing at it
//!
//! Run with: `cargo test -p fit-battler-integration-tests -- --include-ignored`
//!
//! Every test publishes its own polls and uses fresh user ids, so the tests
//! can share one database and run in parallel.

#![allow(clippy::unwrap_used)]

use tokio::task::JoinSet;
use uuid::Uuid;

use fit_battler_core::{Choice, PollStatus, Tally, UserId};
use fit_battler_engine::db::{PgStore, Store, StoreError};
use fit_battler_engine::services::{SaveToggle, VoteOutcome};
use fit_battler_engine::{Battler, BattlerError};
use fit_battler_integration_tests::{settings, streetwear_draft, test_database_url, user};

async fn battler() -> (Battler<PgStore>, PgStore) {
    let url = test_database_url().expect("FIT_BATTLER_TEST_DATABASE_URL must be set");
    let store = PgStore::connect(&url, settings().store_timeout)
        .await
        .unwrap();
    store.migrate().await.unwrap();
    (Battler::with_settings(store.clone(), settings()), store)
}

fn fresh_user(prefix: &str) -> UserId {
    user(&format!("{prefix}-{}", Uuid::new_v4()))
}

// ============================================================================
// Polls
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_create_and_fetch_poll() {
    let (battler, _) = battler().await;
    let author = fresh_user("author");

    let created = battler
        .polls()
        .create_poll(&streetwear_draft(), &author)
        .await
        .unwrap();
    let fetched = battler.polls().get_poll(created.id).await.unwrap();

    assert_eq!(fetched.description, created.description);
    assert_eq!(fetched.fit_a.item_ids, created.fit_a.item_ids);
    assert_eq!(fetched.fit_b.item_ids, created.fit_b.item_ids);
    assert_eq!(fetched.status, PollStatus::Open);
    assert_eq!(fetched.votes, Tally::default());

    let fit = battler.polls().get_fit(created.fit_b.id).await.unwrap();
    assert_eq!(fit, created.fit_b);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_close_poll_blocks_votes() {
    let (battler, _) = battler().await;
    let poll = battler
        .polls()
        .create_poll(&streetwear_draft(), &fresh_user("author"))
        .await
        .unwrap();

    battler.polls().close_poll(poll.id).await.unwrap();
    battler.polls().close_poll(poll.id).await.unwrap();

    let err = battler
        .polls()
        .record_vote(poll.id, &fresh_user("voter"), Choice::A)
        .await
        .unwrap_err();
    assert!(matches!(err, BattlerError::PollClosed(_)));
}

// ============================================================================
// Votes
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_duplicate_vote_counts_once() {
    let (battler, store) = battler().await;
    let poll = battler
        .polls()
        .create_poll(&streetwear_draft(), &fresh_user("author"))
        .await
        .unwrap();
    let voter = fresh_user("voter");

    let first = battler
        .polls()
        .record_vote(poll.id, &voter, Choice::A)
        .await
        .unwrap();
    let second = battler
        .polls()
        .record_vote(poll.id, &voter, Choice::B)
        .await
        .unwrap();

    assert_eq!(first.outcome, VoteOutcome::Recorded);
    assert_eq!(second.outcome, VoteOutcome::AlreadyVoted { choice: Choice::A });
    assert_eq!(second.poll.votes, Tally::new(1, 0));

    let record = store.get_vote(poll.id, &voter).await.unwrap().unwrap();
    assert_eq!(record.choice, Choice::A);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_concurrent_votes_match_ledger() {
    let (battler, store) = battler().await;
    let poll_id = battler
        .polls()
        .create_poll(&streetwear_draft(), &fresh_user("author"))
        .await
        .unwrap()
        .id;
    let run = Uuid::new_v4();

    let mut tasks = JoinSet::new();
    for n in 0..24 {
        let battler = battler.clone();
        tasks.spawn(async move {
            // Each voter submits twice
            let voter = user(&format!("voter-{run}-{}", n % 12));
            let choice = if n % 3 == 0 { Choice::A } else { Choice::B };
            battler
                .polls()
                .record_vote(poll_id, &voter, choice)
                .await
                .unwrap();
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let poll = store.get_poll(poll_id).await.unwrap().unwrap();
    assert_eq!(poll.votes.total(), 12);

    let (ledger_rows,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM battler.vote WHERE poll_id = $1")
            .bind(poll_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(ledger_rows, 12);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_next_poll_skips_voted() {
    let (battler, _) = battler().await;
    let poll = battler
        .polls()
        .create_poll(&streetwear_draft(), &fresh_user("author"))
        .await
        .unwrap();
    let voter = fresh_user("voter");

    battler
        .polls()
        .record_vote(poll.id, &voter, Choice::A)
        .await
        .unwrap();

    if let Some(next) = battler.polls().next_unvoted_poll(&voter).await {
        assert_ne!(next.id, poll.id);
        assert!(!battler.ledger().has_voted(next.id, &voter).await.unwrap());
    }
}

// ============================================================================
// Saves and comments
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_toggle_save_round_trip() {
    let (battler, store) = battler().await;
    let poll = battler
        .polls()
        .create_poll(&streetwear_draft(), &fresh_user("author"))
        .await
        .unwrap();
    let saver = fresh_user("saver");

    let state = battler
        .saves()
        .toggle_save(&saver, poll.id, poll.fit_a.id)
        .await
        .unwrap();
    assert_eq!(state, SaveToggle::Saved);

    let entries = battler.saves().saved_entries(&saver).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries.first().unwrap().fit, poll.fit_a);

    let entry = entries.into_iter().next().unwrap();
    let err = store.insert_saved(&entry).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let state = battler
        .saves()
        .toggle_save(&saver, poll.id, poll.fit_a.id)
        .await
        .unwrap();
    assert_eq!(state, SaveToggle::Unsaved);
    assert!(battler.saves().saved_entries(&saver).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_comment_on_unknown_fit() {
    let (battler, _) = battler().await;
    let err = battler
        .comments()
        .add_comment(fit_battler_core::FitId::new_v4(), &fresh_user("c"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, BattlerError::NotFound(_)));
}
