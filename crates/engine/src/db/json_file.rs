//! JSON snapshot store for seed-data mode.
//!
//! Each collection lives in its own file inside the data directory:
//!
//! ```text
//! data/
//! ├── polls.json
//! ├── votes.json
//! ├── saved.json
//! └── comments.json
//! ```
//!
//! Files are rewritten whole after each mutation (write to a temporary file,
//! then rename). The vote ledger is its own file and the commit point for a
//! vote: `polls.json` is written first, `votes.json` last, and tallies are
//! re-derived from the ledger on open. A vote whose ledger write failed is
//! therefore never counted after a restart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use fit_battler_core::{
    Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, UserId, VoteRecord,
};

use super::tables::{Collections, Tables};
use super::{PollQuery, Store, StoreError, VoteInsert};

const POLLS_FILE: &str = "polls.json";
const VOTES_FILE: &str = "votes.json";
const SAVED_FILE: &str = "saved.json";
const COMMENTS_FILE: &str = "comments.json";

/// Which snapshot files a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Polls,
    Votes,
    Saved,
    Comments,
}

impl Collection {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Polls => POLLS_FILE,
            Self::Votes => VOTES_FILE,
            Self::Saved => SAVED_FILE,
            Self::Comments => COMMENTS_FILE,
        }
    }
}

/// A [`Store`] backed by JSON files in a directory.
///
/// Cheaply cloneable; clones share the same tables and directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<JsonFileStoreInner>,
}

#[derive(Debug)]
struct JsonFileStoreInner {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Open (or create) a store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created or read,
    /// `StoreError::Serialization` if a file is not valid JSON, and
    /// `StoreError::DataCorruption` if the files contradict each other.
    #[instrument(fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path> + std::fmt::Debug) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let collections = Collections {
            polls: read_collection(&dir, POLLS_FILE).await?,
            votes: read_collection(&dir, VOTES_FILE).await?,
            saved: read_collection(&dir, SAVED_FILE).await?,
            comments: read_collection(&dir, COMMENTS_FILE).await?,
        };
        info!(
            polls = collections.polls.len(),
            votes = collections.votes.len(),
            saved = collections.saved.len(),
            comments = collections.comments.len(),
            "Loaded JSON store"
        );
        let tables = Tables::from_collections(collections)?;

        Ok(Self {
            inner: Arc::new(JsonFileStoreInner {
                dir,
                tables: Mutex::new(tables),
            }),
        })
    }

    /// The directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Apply `mutate` to a copy of the tables, persist the touched
    /// collections, and only then publish the copy.
    ///
    /// A failed write leaves both the files and the in-memory view unchanged.
    async fn mutate<T, F>(&self, touched: &[Collection], mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Tables) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut guard = self.inner.tables.lock().await;
        let mut next = guard.clone();
        let out = mutate(&mut next)?;

        let snapshot = next.to_collections();
        for collection in touched {
            match collection {
                Collection::Polls => self.write(*collection, &snapshot.polls).await?,
                Collection::Votes => self.write(*collection, &snapshot.votes).await?,
                Collection::Saved => self.write(*collection, &snapshot.saved).await?,
                Collection::Comments => self.write(*collection, &snapshot.comments).await?,
            }
        }

        *guard = next;
        Ok(out)
    }

    async fn write<T: Serialize + Sync>(
        &self,
        collection: Collection,
        records: &[T],
    ) -> Result<(), StoreError> {
        let path = self.inner.dir.join(collection.file_name());
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(file = %path.display(), records = records.len(), "Wrote snapshot");
        Ok(())
    }
}

async fn read_collection<T: DeserializeOwned>(
    dir: &Path,
    file_name: &str,
) -> Result<Vec<T>, StoreError> {
    let path = dir.join(file_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

impl Store for JsonFileStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let poll = poll.clone();
        self.mutate(&[Collection::Polls], move |tables| tables.insert_poll(poll))
            .await
    }

    async fn get_poll(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        Ok(self.inner.tables.lock().await.get_poll(id))
    }

    async fn get_fit(&self, id: FitId) -> Result<Option<Fit>, StoreError> {
        Ok(self.inner.tables.lock().await.get_fit(id))
    }

    async fn list_polls(&self, query: PollQuery) -> Result<Vec<Poll>, StoreError> {
        Ok(self.inner.tables.lock().await.list_polls(query))
    }

    async fn set_poll_status(&self, id: PollId, status: PollStatus) -> Result<bool, StoreError> {
        self.mutate(&[Collection::Polls], move |tables| {
            Ok(tables.set_poll_status(id, status))
        })
        .await
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<VoteInsert, StoreError> {
        self.mutate(&[Collection::Polls, Collection::Votes], |tables| {
            Ok(tables.record_vote(vote))
        })
        .await
    }

    async fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self.inner.tables.lock().await.get_vote(poll_id, user_id))
    }

    async fn voted_poll_ids(&self, user_id: &UserId) -> Result<HashSet<PollId>, StoreError> {
        Ok(self.inner.tables.lock().await.voted_poll_ids(user_id))
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), StoreError> {
        self.mutate(&[Collection::Saved], |tables| tables.insert_saved(entry))
            .await
    }

    async fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<bool, StoreError> {
        self.mutate(&[Collection::Saved], |tables| {
            Ok(tables.delete_saved(user_id, poll_id, fit_id))
        })
        .await
    }

    async fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<Option<SavedEntry>, StoreError> {
        Ok(self
            .inner
            .tables
            .lock()
            .await
            .get_saved(user_id, poll_id, fit_id))
    }

    async fn list_saved(&self, user_id: &UserId) -> Result<Vec<SavedEntry>, StoreError> {
        Ok(self.inner.tables.lock().await.list_saved(user_id))
    }

    async fn insert_comment(&self, comment: &FitComment) -> Result<(), StoreError> {
        self.mutate(&[Collection::Comments], |tables| {
            tables.insert_comment(comment)
        })
        .await
    }

    async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>, StoreError> {
        Ok(self.inner.tables.lock().await.list_comments(fit_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use fit_battler_core::{Choice, ItemId, Tally};

    use super::*;

    fn poll() -> Poll {
        Poll {
            id: PollId::new_v4(),
            author_id: UserId::new("author"),
            description: "Streetwear showdown".to_owned(),
            fit_a: Fit {
                id: FitId::new_v4(),
                name: "A".to_owned(),
                item_ids: vec![ItemId::new("i1"), ItemId::new("i2"), ItemId::new("i3")],
            },
            fit_b: Fit {
                id: FitId::new_v4(),
                name: "B".to_owned(),
                item_ids: vec![ItemId::new("i4"), ItemId::new("i5"), ItemId::new("i6")],
            },
            created_at: Utc::now(),
            status: PollStatus::Open,
            votes: Tally::default(),
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        let poll = poll();
        {
            let store = JsonFileStore::open(&dir).await.unwrap();
            store.insert_poll(&poll).await.unwrap();
            let vote = VoteRecord {
                poll_id: poll.id,
                user_id: UserId::new("userX"),
                choice: Choice::B,
                cast_at: Utc::now(),
            };
            store.record_vote(&vote).await.unwrap();
        }

        let reopened = JsonFileStore::open(&dir).await.unwrap();
        let loaded = reopened.get_poll(poll.id).await.unwrap().unwrap();
        assert_eq!(loaded.votes, Tally::new(0, 1));
        assert_eq!(loaded.fit_a.item_ids, poll.fit_a.item_ids);
        assert!(
            reopened
                .get_vote(poll.id, &UserId::new("userX"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_open_empty_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        let store = JsonFileStore::open(&dir).await.unwrap();
        assert!(
            store
                .list_polls(PollQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(POLLS_FILE), b"{not json")
            .await
            .unwrap();

        let result = JsonFileStore::open(&dir).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_untouched() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        let store = JsonFileStore::open(&dir).await.unwrap();
        let poll = poll();
        store.insert_poll(&poll).await.unwrap();

        // Inserting the same poll again fails inside the mutation
        assert!(store.insert_poll(&poll).await.is_err());
        let listed = store.list_polls(PollQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    fn vote(poll_id: PollId, user: &str, choice: Choice) -> VoteRecord {
        VoteRecord {
            poll_id,
            user_id: UserId::new(user),
            choice,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_vote_with_failed_ledger_write_is_not_counted_after_reopen() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        let poll = poll();
        {
            let store = JsonFileStore::open(&dir).await.unwrap();
            store.insert_poll(&poll).await.unwrap();

            // polls.json is rewritten, then the ledger write fails
            let blocker = dir.join("votes.json.tmp");
            tokio::fs::create_dir_all(&blocker).await.unwrap();
            let result = store.record_vote(&vote(poll.id, "userX", Choice::A)).await;
            assert!(matches!(result, Err(StoreError::Io(_))));

            let current = store.get_poll(poll.id).await.unwrap().unwrap();
            assert_eq!(current.votes, Tally::default());
            assert!(store.get_vote(poll.id, &UserId::new("userX")).await.unwrap().is_none());
            tokio::fs::remove_dir_all(&blocker).await.unwrap();
        }

        let reopened = JsonFileStore::open(&dir).await.unwrap();
        let loaded = reopened.get_poll(poll.id).await.unwrap().unwrap();
        assert_eq!(loaded.votes, Tally::default());
        assert!(
            reopened
                .voted_poll_ids(&UserId::new("userX"))
                .await
                .unwrap()
                .is_empty()
        );

        // The same vote goes through once the directory is writable again
        let retried = reopened
            .record_vote(&vote(poll.id, "userX", Choice::A))
            .await
            .unwrap();
        assert_eq!(retried, VoteInsert::Recorded(Tally::new(1, 0)));
    }

    #[tokio::test]
    async fn test_failed_first_write_persists_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("data");
        let poll = poll();
        {
            let store = JsonFileStore::open(&dir).await.unwrap();
            store.insert_poll(&poll).await.unwrap();
            tokio::fs::create_dir_all(dir.join("polls.json.tmp"))
                .await
                .unwrap();
            assert!(store.record_vote(&vote(poll.id, "userX", Choice::B)).await.is_err());
        }
        tokio::fs::remove_dir_all(dir.join("polls.json.tmp"))
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&dir).await.unwrap();
        let loaded = reopened.get_poll(poll.id).await.unwrap().unwrap();
        assert_eq!(loaded.votes, Tally::default());
    }
}
