//! Process-local store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use fit_battler_core::{
    Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, UserId, VoteRecord,
};

use super::tables::Tables;
use super::{PollQuery, Store, StoreError, VoteInsert};

/// A [`Store`] that keeps everything in memory.
///
/// Cheaply cloneable; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        self.tables.write().await.insert_poll(poll.clone())
    }

    async fn get_poll(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        Ok(self.tables.read().await.get_poll(id))
    }

    async fn get_fit(&self, id: FitId) -> Result<Option<Fit>, StoreError> {
        Ok(self.tables.read().await.get_fit(id))
    }

    async fn list_polls(&self, query: PollQuery) -> Result<Vec<Poll>, StoreError> {
        Ok(self.tables.read().await.list_polls(query))
    }

    async fn set_poll_status(&self, id: PollId, status: PollStatus) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.set_poll_status(id, status))
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<VoteInsert, StoreError> {
        Ok(self.tables.write().await.record_vote(vote))
    }

    async fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self.tables.read().await.get_vote(poll_id, user_id))
    }

    async fn voted_poll_ids(&self, user_id: &UserId) -> Result<HashSet<PollId>, StoreError> {
        Ok(self.tables.read().await.voted_poll_ids(user_id))
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), StoreError> {
        self.tables.write().await.insert_saved(entry)
    }

    async fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .write()
            .await
            .delete_saved(user_id, poll_id, fit_id))
    }

    async fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<Option<SavedEntry>, StoreError> {
        Ok(self.tables.read().await.get_saved(user_id, poll_id, fit_id))
    }

    async fn list_saved(&self, user_id: &UserId) -> Result<Vec<SavedEntry>, StoreError> {
        Ok(self.tables.read().await.list_saved(user_id))
    }

    async fn insert_comment(&self, comment: &FitComment) -> Result<(), StoreError> {
        self.tables.write().await.insert_comment(comment)
    }

    async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>, StoreError> {
        Ok(self.tables.read().await.list_comments(fit_id))
    }
}
