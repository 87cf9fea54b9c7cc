//! Integration tests for storage failures.
//!
//! The services run over a store that fails or stalls on chosen operations.
//! A failed vote must leave the pre-vote state, picking the next poll must
//! degrade to an empty result, and a failed save toggle must leave
//! membership as it was.

#![allow(clippy::unwrap_used)]

use fit_battler_core::{Choice, Poll, Tally};
use fit_battler_engine::{Battler, BattlerError};
use fit_battler_engine::db::{Store, StoreError};
use fit_battler_engine::reconcile::{TallyCache, TallyView};
use fit_battler_engine::services::SaveToggle;
use fit_battler_integration_tests::{
    Fault, FaultyStore, StoreOp, faulty_battler, streetwear_draft, user,
};

async fn published(battler: &Battler<FaultyStore>) -> Poll {
    battler
        .polls()
        .create_poll(&streetwear_draft(), &user("author"))
        .await
        .unwrap()
}

// ============================================================================
// Vote submission
// ============================================================================

#[tokio::test]
async fn test_failed_vote_restores_pre_vote_state() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    let poll = published(&battler).await;
    let cache = TallyCache::new();

    store.arm(StoreOp::RecordVote, Fault::Fail);
    let err = battler
        .polls()
        .submit_vote(poll.id, &user("me"), Choice::A, &cache)
        .await
        .unwrap_err();

    assert!(matches!(err, BattlerError::Storage(StoreError::Io(_))));
    assert!(err.is_retryable());
    assert_eq!(cache.view(poll.id), Some(TallyView::Confirmed(Tally::default())));
    assert!(store.inner().get_vote(poll.id, &user("me")).await.unwrap().is_none());
    assert_eq!(
        store.inner().get_poll(poll.id).await.unwrap().unwrap().votes,
        Tally::default()
    );

    // The same vote can be resubmitted once the store recovers
    store.heal();
    let receipt = battler
        .polls()
        .submit_vote(poll.id, &user("me"), Choice::A, &cache)
        .await
        .unwrap();
    assert_eq!(receipt.tally, TallyView::Confirmed(Tally::new(1, 0)));
}

#[tokio::test]
async fn test_stalled_vote_times_out_and_rolls_back() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    let poll = published(&battler).await;
    let cache = TallyCache::new();
    cache.observe(&poll);

    store.arm(StoreOp::RecordVote, Fault::Stall);
    let err = battler
        .polls()
        .submit_vote(poll.id, &user("me"), Choice::B, &cache)
        .await
        .unwrap_err();

    assert!(matches!(err, BattlerError::Storage(StoreError::Timeout(_))));
    assert!(err.is_retryable());
    assert_eq!(cache.view(poll.id), Some(TallyView::Confirmed(Tally::default())));
    assert!(
        !battler
            .ledger()
            .has_voted(poll.id, &user("me"))
            .await
            .unwrap()
    );
}

// ============================================================================
// Next poll
// ============================================================================

#[tokio::test]
async fn test_next_poll_is_none_when_ledger_read_fails() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    let poll = published(&battler).await;

    store.arm(StoreOp::VotedPollIds, Fault::Fail);
    assert!(battler.polls().next_unvoted_poll(&user("me")).await.is_none());

    store.heal();
    let next = battler.polls().next_unvoted_poll(&user("me")).await.unwrap();
    assert_eq!(next.id, poll.id);
}

#[tokio::test]
async fn test_next_poll_is_none_when_listing_stalls() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    published(&battler).await;

    store.arm(StoreOp::ListPolls, Fault::Stall);
    assert!(battler.polls().next_unvoted_poll(&user("me")).await.is_none());
}

// ============================================================================
// Save toggling
// ============================================================================

#[tokio::test]
async fn test_failed_save_leaves_fit_unsaved() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    let poll = published(&battler).await;
    let me = user("me");

    store.arm(StoreOp::InsertSaved, Fault::Fail);
    let result = battler.saves().toggle_save(&me, poll.id, poll.fit_a.id).await;

    assert!(matches!(result, Err(BattlerError::Storage(_))));
    store.heal();
    assert!(!battler.saves().is_saved(&me, poll.id, poll.fit_a.id).await.unwrap());
}

#[tokio::test]
async fn test_failed_unsave_leaves_fit_saved() {
    let store = FaultyStore::new();
    let battler = faulty_battler(store.clone());
    let poll = published(&battler).await;
    let me = user("me");

    let saved = battler
        .saves()
        .toggle_save(&me, poll.id, poll.fit_b.id)
        .await
        .unwrap();
    assert_eq!(saved, SaveToggle::Saved);

    store.arm(StoreOp::DeleteSaved, Fault::Fail);
    assert!(
        battler
            .saves()
            .toggle_save(&me, poll.id, poll.fit_b.id)
            .await
            .is_err()
    );

    store.arm(StoreOp::DeleteSaved, Fault::Stall);
    let result = battler.saves().toggle_save(&me, poll.id, poll.fit_b.id).await;
    assert!(matches!(
        result,
        Err(BattlerError::Storage(StoreError::Timeout(_)))
    ));

    store.heal();
    assert!(battler.saves().is_saved(&me, poll.id, poll.fit_b.id).await.unwrap());
    assert_eq!(store.inner().list_saved(&me).await.unwrap().len(), 1);
}
