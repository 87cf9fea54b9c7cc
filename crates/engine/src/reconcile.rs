//! Client-side tally reconciliation.
//!
//! A vote is shown immediately as an optimistic increment, then replaced by
//! the authoritative tally once the store answers. Two rules hold throughout:
//!
//! - a confirmed view never drops below a tally this cache has already shown
//!   as confirmed (votes never visibly disappear)
//! - an optimistic increment the store did not confirm is discarded, and a
//!   failed write rolls the view back to its pre-vote state
//!
//! The cache is shareable (`Arc<TallyCache>`), so a reader can poll
//! [`TallyCache::view`] while a submission is still in flight.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use fit_battler_core::{Choice, Poll, PollId, Tally};

/// A tally tagged with how far it can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "tally", rename_all = "lowercase")]
pub enum TallyView {
    /// Includes a local increment the store has not confirmed yet.
    Optimistic(Tally),
    /// As reported by the store.
    Confirmed(Tally),
}

impl TallyView {
    /// The tally regardless of confidence.
    #[must_use]
    pub const fn tally(&self) -> Tally {
        match self {
            Self::Optimistic(tally) | Self::Confirmed(tally) => *tally,
        }
    }

    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Rounded percentages for display.
    #[must_use]
    pub fn percentages(&self) -> (u8, u8) {
        self.tally().percentages()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    confirmed: Tally,
    pending: Option<Choice>,
}

impl Entry {
    fn view(self) -> TallyView {
        match self.pending {
            Some(choice) => TallyView::Optimistic(self.confirmed.incremented(choice)),
            None => TallyView::Confirmed(self.confirmed),
        }
    }
}

/// Per-poll tallies as last shown to one client.
#[derive(Debug, Default)]
pub struct TallyCache {
    entries: Mutex<HashMap<PollId, Entry>>,
}

impl TallyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PollId, Entry>> {
        // Entries are plain data; a panic mid-update cannot leave them torn
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a tally read from the store.
    pub fn observe(&self, poll: &Poll) -> TallyView {
        let mut entries = self.entries();
        let entry = entries.entry(poll.id).or_default();
        entry.confirmed = entry.confirmed.merge_monotonic(poll.votes);
        entry.view()
    }

    /// Show `choice` as counted before the store has answered.
    pub fn apply_optimistic(&self, poll_id: PollId, choice: Choice) -> TallyView {
        let mut entries = self.entries();
        let entry = entries.entry(poll_id).or_default();
        entry.pending = Some(choice);
        entry.view()
    }

    /// Replace any optimistic value with the store's answer.
    ///
    /// The result is the per-side maximum of `authoritative` and every tally
    /// previously confirmed for this poll.
    pub fn confirm(&self, poll_id: PollId, authoritative: Tally) -> TallyView {
        let mut entries = self.entries();
        let entry = entries.entry(poll_id).or_default();
        entry.pending = None;
        entry.confirmed = entry.confirmed.merge_monotonic(authoritative);
        entry.view()
    }

    /// Undo an optimistic increment after a failed write.
    pub fn rollback(&self, poll_id: PollId, choice: Choice) -> TallyView {
        let mut entries = self.entries();
        let entry = entries.entry(poll_id).or_default();
        if entry.pending == Some(choice) {
            entry.pending = None;
        }
        entry.view()
    }

    /// The current view of a poll, if it has been seen.
    #[must_use]
    pub fn view(&self, poll_id: PollId) -> Option<TallyView> {
        self.entries().get(&poll_id).map(|entry| entry.view())
    }
}
