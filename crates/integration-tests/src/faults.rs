//! A store that fails or stalls on demand.
//!
//! Wraps a [`MemoryStore`]; every call first checks whether a fault is armed
//! for its operation. A failing call returns `StoreError::Io` without touching
//! the tables, a stalling call never completes (the services' store timeout
//! ends it).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use fit_battler_core::{
    Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, UserId, VoteRecord,
};
use fit_battler_engine::db::{MemoryStore, PollQuery, Store, StoreError, VoteInsert};

/// Store operations a fault can be armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertPoll,
    GetPoll,
    ListPolls,
    RecordVote,
    VotedPollIds,
    InsertSaved,
    DeleteSaved,
    GetSaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an I/O error.
    Fail,
    /// Never answer.
    Stall,
}

/// A [`MemoryStore`] with injectable faults.
///
/// Clones share tables and armed faults.
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<Mutex<HashMap<StoreOp, Fault>>>,
}

impl FaultyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `op` call fail or stall until [`Self::heal`].
    pub fn arm(&self, op: StoreOp, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, fault);
    }

    /// Clear every armed fault.
    pub fn heal(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The healthy store underneath, for checking what was persisted.
    #[must_use]
    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn fault(&self, op: StoreOp) -> Option<Fault> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .copied()
    }

    async fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        match self.fault(op) {
            None => Ok(()),
            Some(Fault::Fail) => Err(StoreError::Io(std::io::Error::other(format!(
                "{op:?} unavailable"
            )))),
            Some(Fault::Stall) => std::future::pending().await,
        }
    }
}

impl Store for FaultyStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        self.check(StoreOp::InsertPoll).await?;
        self.inner.insert_poll(poll).await
    }

    async fn get_poll(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        self.check(StoreOp::GetPoll).await?;
        self.inner.get_poll(id).await
    }

    async fn get_fit(&self, id: FitId) -> Result<Option<Fit>, StoreError> {
        self.inner.get_fit(id).await
    }

    async fn list_polls(&self, query: PollQuery) -> Result<Vec<Poll>, StoreError> {
        self.check(StoreOp::ListPolls).await?;
        self.inner.list_polls(query).await
    }

    async fn set_poll_status(&self, id: PollId, status: PollStatus) -> Result<bool, StoreError> {
        self.inner.set_poll_status(id, status).await
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<VoteInsert, StoreError> {
        self.check(StoreOp::RecordVote).await?;
        self.inner.record_vote(vote).await
    }

    async fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.inner.get_vote(poll_id, user_id).await
    }

    async fn voted_poll_ids(&self, user_id: &UserId) -> Result<HashSet<PollId>, StoreError> {
        self.check(StoreOp::VotedPollIds).await?;
        self.inner.voted_poll_ids(user_id).await
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), StoreError> {
        self.check(StoreOp::InsertSaved).await?;
        self.inner.insert_saved(entry).await
    }

    async fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<bool, StoreError> {
        self.check(StoreOp::DeleteSaved).await?;
        self.inner.delete_saved(user_id, poll_id, fit_id).await
    }

    async fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<Option<SavedEntry>, StoreError> {
        self.check(StoreOp::GetSaved).await?;
        self.inner.get_saved(user_id, poll_id, fit_id).await
    }

    async fn list_saved(&self, user_id: &UserId) -> Result<Vec<SavedEntry>, StoreError> {
        self.inner.list_saved(user_id).await
    }

    async fn insert_comment(&self, comment: &FitComment) -> Result<(), StoreError> {
        self.inner.insert_comment(comment).await
    }

    async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>, StoreError> {
        self.inner.list_comments(fit_id).await
    }
}
