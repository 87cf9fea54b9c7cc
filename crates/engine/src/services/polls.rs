//! Poll Store.
//!
//! Owns the poll and fit lifecycle: polls are created open with an empty
//! tally, change only through vote recording and closing, and are never
//! deleted. Tallies are written exclusively through the [`VoteLedger`].

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use fit_battler_core::{
    Choice, Fit, FitDraft, FitId, ItemId, Poll, PollDraft, PollId, PollStatus, Tally, UserId,
};

use super::ledger::{VoteLedger, VoteOutcome};
use super::synth::PollSynthesizer;
use super::{ServiceSettings, bounded};
use crate::db::{PollQuery, Store};
use crate::error::{BattlerError, Result};
use crate::reconcile::{TallyCache, TallyView};

/// Answer to a vote submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    /// The poll, with `votes` set to the tally below.
    pub poll: Poll,
    pub outcome: VoteOutcome,
    pub tally: TallyView,
}

/// Creates, reads and closes polls, and routes votes to the ledger.
#[derive(Debug, Clone)]
pub struct PollService<S> {
    store: S,
    ledger: VoteLedger<S>,
    settings: ServiceSettings,
}

impl<S: Store + Clone> PollService<S> {
    pub fn new(store: S, settings: ServiceSettings) -> Self {
        let ledger = VoteLedger::new(store.clone(), settings.store_timeout);
        Self {
            store,
            ledger,
            settings,
        }
    }

    /// The ledger this service records votes through.
    pub const fn ledger(&self) -> &VoteLedger<S> {
        &self.ledger
    }

    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Validate and publish a poll.
    ///
    /// Both fits are persisted with the poll as one unit. The new poll is
    /// open with a zero tally; item order is preserved.
    ///
    /// # Errors
    ///
    /// - `BattlerError::Validation` if the description is blank or a fit has
    ///   unfilled slots; nothing is persisted
    /// - `BattlerError::Storage` if the store call fails or times out
    #[instrument(skip(self, draft), fields(author_id = %author_id))]
    pub async fn create_poll(&self, draft: &PollDraft, author_id: &UserId) -> Result<Poll> {
        draft.validate(self.settings.fit_slots)?;

        let poll = Poll {
            id: PollId::new_v4(),
            author_id: author_id.clone(),
            description: draft.description.trim().to_owned(),
            fit_a: build_fit(draft.fit(Choice::A), Choice::A),
            fit_b: build_fit(draft.fit(Choice::B), Choice::B),
            created_at: Utc::now(),
            status: PollStatus::Open,
            votes: Tally::default(),
        };

        bounded(self.settings.store_timeout, self.store.insert_poll(&poll))
            .await
            .inspect_err(|e| error!(error = %e, "Failed to publish poll"))?;

        info!(poll_id = %poll.id, "Poll created");
        Ok(poll)
    }

    /// Fetch a poll.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::NotFound` if no such poll exists, or
    /// `BattlerError::Storage` if the store call fails or times out.
    pub async fn get_poll(&self, poll_id: PollId) -> Result<Poll> {
        bounded(self.settings.store_timeout, self.store.get_poll(poll_id))
            .await?
            .ok_or_else(|| BattlerError::poll_not_found(poll_id))
    }

    /// Fetch a fit by id.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::NotFound` if no such fit exists, or
    /// `BattlerError::Storage` if the store call fails or times out.
    pub async fn get_fit(&self, fit_id: FitId) -> Result<Fit> {
        bounded(self.settings.store_timeout, self.store.get_fit(fit_id))
            .await?
            .ok_or_else(|| BattlerError::NotFound(format!("fit {fit_id}")))
    }

    /// The most recent polls regardless of status, newest first.
    ///
    /// `limit` defaults to the configured recent window.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn recent_polls(&self, limit: Option<usize>) -> Result<Vec<Poll>> {
        let limit = limit.unwrap_or(self.settings.recent_limit);
        Ok(bounded(
            self.settings.store_timeout,
            self.store.list_polls(PollQuery::recent(limit)),
        )
        .await?)
    }

    /// The newest open poll `user_id` has not voted on.
    ///
    /// Never fails: storage errors are logged and reported as `None`, which
    /// callers render as an empty state.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn next_unvoted_poll(&self, user_id: &UserId) -> Option<Poll> {
        match self.find_unvoted(user_id).await {
            Ok(poll) => poll,
            Err(e) => {
                warn!(error = %e, "Could not pick next poll");
                None
            }
        }
    }

    /// Like [`Self::next_unvoted_poll`], but when nothing is left asks
    /// `synthesizer` for a new battle and publishes it.
    ///
    /// Synthesis or publishing failures also degrade to `None`.
    #[instrument(skip(self, synthesizer), fields(user_id = %user_id))]
    pub async fn next_unvoted_poll_with<P: PollSynthesizer>(
        &self,
        user_id: &UserId,
        synthesizer: &P,
    ) -> Option<Poll> {
        match self.find_unvoted(user_id).await {
            Ok(Some(poll)) => return Some(poll),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Could not pick next poll");
                return None;
            }
        }

        let draft = match synthesizer.synthesize(self.settings.fit_slots).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(error = %e, "Could not synthesize a poll");
                return None;
            }
        };

        match self.create_poll(&draft, &synthesizer.author_id()).await {
            Ok(poll) => {
                info!(poll_id = %poll.id, "Served synthesized poll");
                Some(poll)
            }
            Err(e) => {
                warn!(error = %e, "Could not publish synthesized poll");
                None
            }
        }
    }

    async fn find_unvoted(&self, user_id: &UserId) -> Result<Option<Poll>> {
        let voted = self.ledger.voted_polls(user_id).await?;
        let open = bounded(
            self.settings.store_timeout,
            self.store.list_polls(PollQuery::open()),
        )
        .await?;
        Ok(open.into_iter().find(|poll| !voted.contains(&poll.id)))
    }

    /// Record a vote and return the authoritative tally.
    ///
    /// A repeated vote by the same user is absorbed: the outcome is
    /// [`VoteOutcome::AlreadyVoted`] and the tally is unchanged. Authors may
    /// vote on their own polls.
    ///
    /// # Errors
    ///
    /// - `BattlerError::NotFound` if the poll does not exist
    /// - `BattlerError::PollClosed` if the poll is closed
    /// - `BattlerError::Storage` if a store call fails or times out
    #[instrument(skip(self), fields(poll_id = %poll_id, user_id = %user_id, choice = %choice))]
    pub async fn record_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
        choice: Choice,
    ) -> Result<VoteReceipt> {
        let mut poll = self.get_poll(poll_id).await?;
        if !poll.is_open() {
            return Err(BattlerError::PollClosed(poll_id));
        }

        let result = self.ledger.record(poll_id, user_id, choice).await?;
        poll.votes = result.tally;

        Ok(VoteReceipt {
            poll,
            outcome: result.outcome,
            tally: TallyView::Confirmed(result.tally),
        })
    }

    /// Record a vote through a client's [`TallyCache`].
    ///
    /// The cache shows the vote as an optimistic increment while the write is
    /// in flight, then holds the confirmed tally. On failure the increment is
    /// rolled back and the error returned; the caller may resubmit.
    ///
    /// # Errors
    ///
    /// Same as [`Self::record_vote`].
    pub async fn submit_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
        choice: Choice,
        cache: &TallyCache,
    ) -> Result<VoteReceipt> {
        if cache.view(poll_id).is_none() {
            let poll = self.get_poll(poll_id).await?;
            cache.observe(&poll);
        }
        cache.apply_optimistic(poll_id, choice);

        match self.record_vote(poll_id, user_id, choice).await {
            Ok(mut receipt) => {
                receipt.tally = cache.confirm(poll_id, receipt.tally.tally());
                receipt.poll.votes = receipt.tally.tally();
                Ok(receipt)
            }
            Err(e) => {
                cache.rollback(poll_id, choice);
                error!(error = %e, poll_id = %poll_id, "Vote failed, optimistic tally rolled back");
                Err(e)
            }
        }
    }

    /// Close a poll. Closing a closed poll is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::NotFound` if no such poll exists, or
    /// `BattlerError::Storage` if the store call fails or times out.
    #[instrument(skip(self), fields(poll_id = %poll_id))]
    pub async fn close_poll(&self, poll_id: PollId) -> Result<()> {
        let found = bounded(
            self.settings.store_timeout,
            self.store.set_poll_status(poll_id, PollStatus::Closed),
        )
        .await?;
        if !found {
            return Err(BattlerError::poll_not_found(poll_id));
        }
        info!("Poll closed");
        Ok(())
    }
}

fn build_fit(draft: &FitDraft, side: Choice) -> Fit {
    Fit {
        id: FitId::new_v4(),
        name: draft.display_name(side),
        item_ids: draft.item_ids.iter().map(ItemId::new).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::db::MemoryStore;
    use crate::services::RandomBattle;

    fn service() -> PollService<MemoryStore> {
        PollService::new(MemoryStore::new(), ServiceSettings::default())
    }

    fn draft(description: &str) -> PollDraft {
        PollDraft {
            description: description.to_owned(),
            fit_a: FitDraft::new("", ["i1", "i2", "i3"]),
            fit_b: FitDraft::new("Evening", ["i4", "i5", "i6"]),
        }
    }

    #[tokio::test]
    async fn test_create_poll_defaults() {
        let polls = service();
        let poll = polls
            .create_poll(&draft("  Streetwear showdown "), &UserId::new("user1"))
            .await
            .unwrap();

        assert_eq!(poll.status, PollStatus::Open);
        assert_eq!(poll.votes, Tally::default());
        assert_eq!(poll.description, "Streetwear showdown");
        assert_eq!(poll.fit_a.name, "A");
        assert_eq!(poll.fit_b.name, "Evening");
        assert_eq!(polls.get_poll(poll.id).await.unwrap(), poll);
    }

    #[tokio::test]
    async fn test_create_poll_rejects_short_fit() {
        let polls = service();
        let mut bad = draft("Streetwear showdown");
        bad.fit_b = FitDraft::new("B", ["i4", ""]);

        let err = polls
            .create_poll(&bad, &UserId::new("user1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BattlerError::Validation(_)));
        assert!(polls.recent_polls(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vote_on_closed_poll_is_rejected() {
        let polls = service();
        let poll = polls
            .create_poll(&draft("battle"), &UserId::new("user1"))
            .await
            .unwrap();
        polls.close_poll(poll.id).await.unwrap();
        polls.close_poll(poll.id).await.unwrap();

        let err = polls
            .record_vote(poll.id, &UserId::new("userX"), Choice::A)
            .await
            .unwrap_err();
        assert!(matches!(err, BattlerError::PollClosed(id) if id == poll.id));
    }

    #[tokio::test]
    async fn test_author_may_vote_on_own_poll() {
        let polls = service();
        let author = UserId::new("user1");
        let poll = polls.create_poll(&draft("battle"), &author).await.unwrap();
        let receipt = polls.record_vote(poll.id, &author, Choice::B).await.unwrap();
        assert_eq!(receipt.outcome, VoteOutcome::Recorded);
        assert_eq!(receipt.poll.votes, Tally::new(0, 1));
    }

    #[tokio::test]
    async fn test_close_missing_poll() {
        let err = service().close_poll(PollId::new_v4()).await.unwrap_err();
        assert!(matches!(err, BattlerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submit_vote_confirms_in_cache() {
        let polls = service();
        let poll = polls
            .create_poll(&draft("battle"), &UserId::new("user1"))
            .await
            .unwrap();
        let cache = TallyCache::new();

        let receipt = polls
            .submit_vote(poll.id, &UserId::new("userX"), Choice::A, &cache)
            .await
            .unwrap();
        assert_eq!(receipt.tally, TallyView::Confirmed(Tally::new(1, 0)));
        assert_eq!(cache.view(poll.id), Some(receipt.tally));
    }

    #[tokio::test]
    async fn test_submit_vote_rolls_back_on_failure() {
        let polls = service();
        let poll = polls
            .create_poll(&draft("battle"), &UserId::new("user1"))
            .await
            .unwrap();
        polls.close_poll(poll.id).await.unwrap();
        let cache = TallyCache::new();

        assert!(
            polls
                .submit_vote(poll.id, &UserId::new("userX"), Choice::A, &cache)
                .await
                .is_err()
        );
        assert_eq!(
            cache.view(poll.id),
            Some(TallyView::Confirmed(Tally::default()))
        );
    }

    #[tokio::test]
    async fn test_next_unvoted_prefers_newest() {
        let polls = service();
        let user = UserId::new("userX");
        let older = polls
            .create_poll(&draft("older"), &UserId::new("user1"))
            .await
            .unwrap();
        let newer = polls
            .create_poll(&draft("newer"), &UserId::new("user1"))
            .await
            .unwrap();

        assert_eq!(polls.next_unvoted_poll(&user).await.unwrap().id, newer.id);
        polls.record_vote(newer.id, &user, Choice::A).await.unwrap();
        assert_eq!(polls.next_unvoted_poll(&user).await.unwrap().id, older.id);
        polls.close_poll(older.id).await.unwrap();
        assert!(polls.next_unvoted_poll(&user).await.is_none());
    }

    #[tokio::test]
    async fn test_next_unvoted_synthesizes_when_empty() {
        let polls = service();
        let catalog: Vec<fit_battler_core::Item> = (0..8)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "id": format!("i{i}"),
                    "title": format!("Item {i}"),
                    "price": 20,
                }))
                .unwrap()
            })
            .collect();
        let synth = RandomBattle::new(StaticCatalog::new(catalog));

        let poll = polls
            .next_unvoted_poll_with(&UserId::new("userX"), &synth)
            .await
            .unwrap();
        assert_eq!(poll.author_id.as_str(), "fit_battler");
        assert_eq!(poll.fit_a.item_ids.len(), 3);
        assert_eq!(polls.recent_polls(None).await.unwrap().len(), 1);
    }
}
