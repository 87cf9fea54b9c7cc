//! Vote Ledger.
//!
//! Enforces at most one vote per `(poll, user)` and is the only writer of a
//! poll's tally. Uniqueness is delegated to the store's atomic
//! [`Store::record_vote`]; no in-process lock is taken here. Per user and
//! poll the state moves one way, from not voted to voted.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use fit_battler_core::{Choice, PollId, Tally, UserId, VoteRecord};

use super::bounded;
use crate::db::{Store, VoteInsert};
use crate::error::{BattlerError, Result};

/// What happened to a submitted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote by this user on this poll; the tally includes it.
    Recorded,
    /// The user had already voted; nothing changed.
    AlreadyVoted {
        /// The side recorded by the earlier vote.
        choice: Choice,
    },
}

/// Result of [`VoteLedger::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteResult {
    pub outcome: VoteOutcome,
    /// The authoritative tally after the call.
    pub tally: Tally,
}

/// One vote per user per poll.
#[derive(Debug, Clone)]
pub struct VoteLedger<S> {
    store: S,
    timeout: Duration,
}

impl<S: Store> VoteLedger<S> {
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Whether `user_id` has voted on `poll_id`.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn has_voted(&self, poll_id: PollId, user_id: &UserId) -> Result<bool> {
        Ok(self.vote_of(poll_id, user_id).await?.is_some())
    }

    /// The side `user_id` picked on `poll_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn vote_of(&self, poll_id: PollId, user_id: &UserId) -> Result<Option<Choice>> {
        let record = bounded(self.timeout, self.store.get_vote(poll_id, user_id)).await?;
        Ok(record.map(|vote| vote.choice))
    }

    /// Every poll `user_id` has voted on.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn voted_polls(&self, user_id: &UserId) -> Result<HashSet<PollId>> {
        Ok(bounded(self.timeout, self.store.voted_poll_ids(user_id)).await?)
    }

    /// Record `choice` for `user_id` unless they already voted.
    ///
    /// Repeating the call, concurrently or not, never counts the user twice:
    /// later calls report [`VoteOutcome::AlreadyVoted`] with the current tally.
    ///
    /// # Errors
    ///
    /// - `BattlerError::NotFound` if the poll does not exist
    /// - `BattlerError::PollClosed` if the poll no longer accepts votes
    /// - `BattlerError::Storage` if the store call fails or times out; no vote
    ///   was counted in that case
    #[instrument(skip(self), fields(poll_id = %poll_id, user_id = %user_id, choice = %choice))]
    pub async fn record(
        &self,
        poll_id: PollId,
        user_id: &UserId,
        choice: Choice,
    ) -> Result<VoteResult> {
        let vote = VoteRecord {
            poll_id,
            user_id: user_id.clone(),
            choice,
            cast_at: Utc::now(),
        };

        match bounded(self.timeout, self.store.record_vote(&vote)).await? {
            VoteInsert::Recorded(tally) => {
                info!(votes_a = tally.a, votes_b = tally.b, "Vote recorded");
                Ok(VoteResult {
                    outcome: VoteOutcome::Recorded,
                    tally,
                })
            }
            VoteInsert::Duplicate { existing, tally } => {
                debug!(existing = %existing, "Duplicate vote absorbed");
                Ok(VoteResult {
                    outcome: VoteOutcome::AlreadyVoted { choice: existing },
                    tally,
                })
            }
            VoteInsert::PollClosed => Err(BattlerError::PollClosed(poll_id)),
            VoteInsert::PollMissing => Err(BattlerError::poll_not_found(poll_id)),
        }
    }
}
