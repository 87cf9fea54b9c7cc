//! Persistence for polls, votes, saved fits and comments.
//!
//! The services never talk to a database directly; they depend on the
//! [`Store`] trait. Three bindings implement it:
//!
//! - [`MemoryStore`] - process-local tables, used by tests and demos
//! - [`JsonFileStore`] - JSON snapshot files in a data directory (seed-data mode)
//! - [`PgStore`] - `PostgreSQL` via sqlx (live mode)
//!
//! [`Backend`] picks one at runtime from configuration.
//!
//! # Tables (`PostgreSQL` schema `battler`)
//!
//! - `fit` - Immutable item lists, two per poll
//! - `poll` - Published battles with denormalized `votes_a` / `votes_b` counters
//! - `vote` - One row per (poll, user); the primary key is the double-vote guard
//! - `saved_fit` - Per-user bookmarks of (poll, fit)
//! - `fit_comment` - Comments on fits
//!
//! # Migrations
//!
//! Migrations are stored in `crates/engine/migrations/` and run via:
//! ```bash
//! cargo run -p fit-battler-cli -- migrate
//! ```

mod backend;
mod json_file;
mod memory;
mod postgres;
mod tables;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use fit_battler_core::{
    Choice, Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, Tally, UserId,
    VoteRecord,
};

pub use backend::{Backend, BackendError};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error from the JSON binding.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., a fit saved twice).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The operation did not finish within the configured store timeout.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Whether the caller may reasonably offer a "try again".
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Io(_) => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

/// Filter for [`Store::list_polls`]. Results are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollQuery {
    /// Only polls with this status; `None` for all.
    pub status: Option<PollStatus>,
    /// Maximum number of polls; `None` for no limit.
    pub limit: Option<usize>,
}

impl PollQuery {
    /// Every open poll, newest first.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            status: Some(PollStatus::Open),
            limit: None,
        }
    }

    /// The `limit` most recent polls regardless of status.
    #[must_use]
    pub const fn recent(limit: usize) -> Self {
        Self {
            status: None,
            limit: Some(limit),
        }
    }
}

/// Outcome of the atomic "insert vote if absent, then count it" primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteInsert {
    /// The vote was new; the tally includes it.
    Recorded(Tally),
    /// The user had already voted; nothing changed.
    Duplicate {
        /// The side recorded by the earlier vote.
        existing: Choice,
        /// The current authoritative tally.
        tally: Tally,
    },
    /// The poll is closed and accepts no votes.
    PollClosed,
    /// No poll with that ID exists.
    PollMissing,
}

/// Storage operations the poll services need.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - [`Store::record_vote`] must be atomic: a reader never observes a vote
///   record without the matching tally increment, or the reverse
/// - Listing methods return newest first unless stated otherwise
pub trait Store: Send + Sync {
    /// Persist a new poll together with both of its fits as one unit.
    fn insert_poll(&self, poll: &Poll) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Get a poll by ID.
    fn get_poll(&self, id: PollId)
    -> impl Future<Output = Result<Option<Poll>, StoreError>> + Send;

    /// Get a fit by ID.
    fn get_fit(&self, id: FitId) -> impl Future<Output = Result<Option<Fit>, StoreError>> + Send;

    /// List polls matching `query`, newest first.
    fn list_polls(
        &self,
        query: PollQuery,
    ) -> impl Future<Output = Result<Vec<Poll>, StoreError>> + Send;

    /// Set a poll's status. Returns false if the poll does not exist.
    fn set_poll_status(
        &self,
        id: PollId,
        status: PollStatus,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a vote unless one exists for `(poll_id, user_id)`, incrementing
    /// the poll's tally in the same unit.
    fn record_vote(
        &self,
        vote: &VoteRecord,
    ) -> impl Future<Output = Result<VoteInsert, StoreError>> + Send;

    /// Get a user's vote on a poll.
    fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<VoteRecord>, StoreError>> + Send;

    /// IDs of every poll the user has voted on.
    fn voted_poll_ids(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<HashSet<PollId>, StoreError>> + Send;

    /// Insert a saved entry. Fails with [`StoreError::Conflict`] if the same
    /// `(user, poll, fit)` is already saved.
    fn insert_saved(
        &self,
        entry: &SavedEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a saved entry. Returns true if one existed.
    fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Get a saved entry.
    fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> impl Future<Output = Result<Option<SavedEntry>, StoreError>> + Send;

    /// A user's saved entries, newest first.
    fn list_saved(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<SavedEntry>, StoreError>> + Send;

    /// Persist a new comment.
    fn insert_comment(
        &self,
        comment: &FitComment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Comments on a fit, oldest first.
    fn list_comments(
        &self,
        fit_id: FitId,
    ) -> impl Future<Output = Result<Vec<FitComment>, StoreError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `acquire_timeout` - How long to wait for a free connection
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}
