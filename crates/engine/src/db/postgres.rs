//! `PostgreSQL` binding.
//!
//! Queries are built at runtime with `sqlx::query_as` and decoded into
//! `FromRow` structs, so the crate builds without a live database.
//! The `battler.vote` primary key on `(poll_id, user_id)` is the double-vote
//! guard; `record_vote` inserts the ledger row and bumps the poll counter in
//! one transaction while holding the poll row lock.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info, instrument};

use fit_battler_core::{
    Choice, Fit, FitComment, FitId, ItemId, Poll, PollId, PollStatus, SavedEntry, Tally, UserId,
    VoteRecord,
};

use super::{PollQuery, Store, StoreError, VoteInsert, create_pool};

const POLL_COLUMNS: &str = r"
    SELECT p.id, p.author_id, p.description, p.created_at, p.status,
           p.votes_a, p.votes_b,
           fa.id AS fit_a_id, fa.name AS fit_a_name, fa.item_ids AS fit_a_item_ids,
           fb.id AS fit_b_id, fb.name AS fit_b_name, fb.item_ids AS fit_b_item_ids
    FROM battler.poll p
    JOIN battler.fit fa ON fa.id = p.fit_a_id
    JOIN battler.fit fb ON fb.id = p.fit_b_id
";

const SAVED_COLUMNS: &str = r"
    SELECT s.user_id, s.poll_id, s.author_id, s.saved_at,
           f.id AS fit_id, f.name AS fit_name, f.item_ids AS fit_item_ids
    FROM battler.saved_fit s
    JOIN battler.fit f ON f.id = s.fit_id
";

#[derive(Debug, FromRow)]
struct PollRow {
    id: PollId,
    author_id: UserId,
    description: String,
    created_at: DateTime<Utc>,
    status: PollStatus,
    votes_a: i64,
    votes_b: i64,
    fit_a_id: FitId,
    fit_a_name: String,
    fit_a_item_ids: Vec<String>,
    fit_b_id: FitId,
    fit_b_name: String,
    fit_b_item_ids: Vec<String>,
}

impl TryFrom<PollRow> for Poll {
    type Error = StoreError;

    fn try_from(row: PollRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            author_id: row.author_id,
            description: row.description,
            fit_a: fit_from_parts(row.fit_a_id, row.fit_a_name, row.fit_a_item_ids),
            fit_b: fit_from_parts(row.fit_b_id, row.fit_b_name, row.fit_b_item_ids),
            created_at: row.created_at,
            status: row.status,
            votes: tally_from_counters(row.votes_a, row.votes_b)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct FitRow {
    id: FitId,
    name: String,
    item_ids: Vec<String>,
}

impl From<FitRow> for Fit {
    fn from(row: FitRow) -> Self {
        fit_from_parts(row.id, row.name, row.item_ids)
    }
}

#[derive(Debug, FromRow)]
struct VoteRow {
    poll_id: PollId,
    user_id: UserId,
    choice: Choice,
    cast_at: DateTime<Utc>,
}

impl From<VoteRow> for VoteRecord {
    fn from(row: VoteRow) -> Self {
        Self {
            poll_id: row.poll_id,
            user_id: row.user_id,
            choice: row.choice,
            cast_at: row.cast_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SavedRow {
    user_id: UserId,
    poll_id: PollId,
    author_id: UserId,
    saved_at: DateTime<Utc>,
    fit_id: FitId,
    fit_name: String,
    fit_item_ids: Vec<String>,
}

impl From<SavedRow> for SavedEntry {
    fn from(row: SavedRow) -> Self {
        Self {
            poll_id: row.poll_id,
            user_id: row.user_id,
            author_id: row.author_id,
            fit: fit_from_parts(row.fit_id, row.fit_name, row.fit_item_ids),
            saved_at: row.saved_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: fit_battler_core::CommentId,
    fit_id: FitId,
    author_id: UserId,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for FitComment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            fit_id: row.fit_id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LockedPollRow {
    status: PollStatus,
    votes_a: i64,
    votes_b: i64,
}

fn fit_from_parts(id: FitId, name: String, item_ids: Vec<String>) -> Fit {
    Fit {
        id,
        name,
        item_ids: item_ids.into_iter().map(ItemId::new).collect(),
    }
}

fn tally_from_counters(votes_a: i64, votes_b: i64) -> Result<Tally, StoreError> {
    let a = u64::try_from(votes_a)
        .map_err(|_| StoreError::DataCorruption(format!("negative votes_a: {votes_a}")))?;
    let b = u64::try_from(votes_b)
        .map_err(|_| StoreError::DataCorruption(format!("negative votes_b: {votes_b}")))?;
    Ok(Tally::new(a, b))
}

fn item_id_strings(fit: &Fit) -> Vec<String> {
    fit.item_ids
        .iter()
        .map(|id| id.as_str().to_owned())
        .collect()
}

/// Map unique-key collisions to [`StoreError::Conflict`].
fn conflict_on_unique(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(err)
}

/// A [`Store`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the shared pool settings.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection cannot be established.
    pub async fn connect(
        database_url: &SecretString,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = create_pool(database_url, acquire_timeout).await?;
        info!("Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `crates/engine/migrations/`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if a migration fails.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    async fn insert_fit(tx: &mut Transaction<'_, Postgres>, fit: &Fit) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO battler.fit (id, name, item_ids) VALUES ($1, $2, $3)")
            .bind(fit.id)
            .bind(&fit.name)
            .bind(item_id_strings(fit))
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_on_unique(e, "fit"))?;
        Ok(())
    }
}

impl Store for PgStore {
    #[instrument(skip(self, poll), fields(poll_id = %poll.id))]
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        Self::insert_fit(&mut tx, &poll.fit_a).await?;
        Self::insert_fit(&mut tx, &poll.fit_b).await?;

        let votes_a = i64::try_from(poll.votes.a)
            .map_err(|_| StoreError::DataCorruption("vote count overflow".to_owned()))?;
        let votes_b = i64::try_from(poll.votes.b)
            .map_err(|_| StoreError::DataCorruption("vote count overflow".to_owned()))?;

        sqlx::query(
            r"
            INSERT INTO battler.poll
                (id, author_id, description, fit_a_id, fit_b_id, created_at, status, votes_a, votes_b)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(poll.id)
        .bind(&poll.author_id)
        .bind(&poll.description)
        .bind(poll.fit_a.id)
        .bind(poll.fit_b.id)
        .bind(poll.created_at)
        .bind(poll.status)
        .bind(votes_a)
        .bind(votes_b)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "poll"))?;

        tx.commit().await?;
        debug!("Inserted poll");
        Ok(())
    }

    async fn get_poll(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        let sql = format!("{POLL_COLUMNS} WHERE p.id = $1");
        sqlx::query_as::<_, PollRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Poll::try_from)
            .transpose()
    }

    async fn get_fit(&self, id: FitId) -> Result<Option<Fit>, StoreError> {
        let row = sqlx::query_as::<_, FitRow>(
            "SELECT id, name, item_ids FROM battler.fit WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Fit::from))
    }

    async fn list_polls(&self, query: PollQuery) -> Result<Vec<Poll>, StoreError> {
        let sql = format!(
            "{POLL_COLUMNS}
             WHERE ($1::battler.poll_status IS NULL OR p.status = $1)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $2"
        );
        let limit = query.limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        sqlx::query_as::<_, PollRow>(&sql)
            .bind(query.status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Poll::try_from)
            .collect()
    }

    async fn set_poll_status(&self, id: PollId, status: PollStatus) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE battler.poll SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, vote), fields(poll_id = %vote.poll_id, user_id = %vote.user_id))]
    async fn record_vote(&self, vote: &VoteRecord) -> Result<VoteInsert, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes voters on this poll until commit
        let locked = sqlx::query_as::<_, LockedPollRow>(
            "SELECT status, votes_a, votes_b FROM battler.poll WHERE id = $1 FOR UPDATE",
        )
        .bind(vote.poll_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(locked) = locked else {
            return Ok(VoteInsert::PollMissing);
        };
        let current = tally_from_counters(locked.votes_a, locked.votes_b)?;

        let existing = sqlx::query_scalar::<_, Choice>(
            "SELECT choice FROM battler.vote WHERE poll_id = $1 AND user_id = $2",
        )
        .bind(vote.poll_id)
        .bind(&vote.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            return Ok(VoteInsert::Duplicate {
                existing,
                tally: current,
            });
        }
        if locked.status == PollStatus::Closed {
            return Ok(VoteInsert::PollClosed);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO battler.vote (poll_id, user_id, choice, cast_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (poll_id, user_id) DO NOTHING
            ",
        )
        .bind(vote.poll_id)
        .bind(&vote.user_id)
        .bind(vote.choice)
        .bind(vote.cast_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Lost a race with a writer that bypassed the row lock
            tx.rollback().await?;
            let existing = self
                .get_vote(vote.poll_id, &vote.user_id)
                .await?
                .map_or(vote.choice, |record| record.choice);
            let tally = self
                .get_poll(vote.poll_id)
                .await?
                .map_or(current, |poll| poll.votes);
            return Ok(VoteInsert::Duplicate { existing, tally });
        }

        let bump = match vote.choice {
            Choice::A => {
                "UPDATE battler.poll SET votes_a = votes_a + 1 WHERE id = $1 RETURNING status, votes_a, votes_b"
            }
            Choice::B => {
                "UPDATE battler.poll SET votes_b = votes_b + 1 WHERE id = $1 RETURNING status, votes_a, votes_b"
            }
        };
        let updated = sqlx::query_as::<_, LockedPollRow>(bump)
            .bind(vote.poll_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        let tally = tally_from_counters(updated.votes_a, updated.votes_b)?;
        debug!(?tally, "Recorded vote");
        Ok(VoteInsert::Recorded(tally))
    }

    async fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let row = sqlx::query_as::<_, VoteRow>(
            r"
            SELECT poll_id, user_id, choice, cast_at
            FROM battler.vote
            WHERE poll_id = $1 AND user_id = $2
            ",
        )
        .bind(poll_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VoteRecord::from))
    }

    async fn voted_poll_ids(&self, user_id: &UserId) -> Result<HashSet<PollId>, StoreError> {
        let ids = sqlx::query_scalar::<_, PollId>(
            "SELECT poll_id FROM battler.vote WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO battler.saved_fit (user_id, poll_id, fit_id, author_id, saved_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&entry.user_id)
        .bind(entry.poll_id)
        .bind(entry.fit.id)
        .bind(&entry.author_id)
        .bind(entry.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "saved fit"))?;
        Ok(())
    }

    async fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM battler.saved_fit WHERE user_id = $1 AND poll_id = $2 AND fit_id = $3",
        )
        .bind(user_id)
        .bind(poll_id)
        .bind(fit_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<Option<SavedEntry>, StoreError> {
        let sql = format!(
            "{SAVED_COLUMNS} WHERE s.user_id = $1 AND s.poll_id = $2 AND s.fit_id = $3"
        );
        let row = sqlx::query_as::<_, SavedRow>(&sql)
            .bind(user_id)
            .bind(poll_id)
            .bind(fit_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SavedEntry::from))
    }

    async fn list_saved(&self, user_id: &UserId) -> Result<Vec<SavedEntry>, StoreError> {
        let sql = format!("{SAVED_COLUMNS} WHERE s.user_id = $1 ORDER BY s.saved_at DESC");
        let rows = sqlx::query_as::<_, SavedRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SavedEntry::from).collect())
    }

    async fn insert_comment(&self, comment: &FitComment) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO battler.fit_comment (id, fit_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(comment.id)
        .bind(comment.fit_id)
        .bind(&comment.author_id)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::NotFound;
            }
            conflict_on_unique(e, "comment")
        })?;
        Ok(())
    }

    async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r"
            SELECT id, fit_id, author_id, body, created_at
            FROM battler.fit_comment
            WHERE fit_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(fit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FitComment::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_from_counters() {
        assert_eq!(tally_from_counters(3, 4).unwrap(), Tally::new(3, 4));
        assert!(matches!(
            tally_from_counters(-1, 0),
            Err(StoreError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_poll_row_conversion() {
        let row = PollRow {
            id: PollId::new_v4(),
            author_id: UserId::new("user1"),
            description: "Streetwear showdown".to_owned(),
            created_at: Utc::now(),
            status: PollStatus::Open,
            votes_a: 2,
            votes_b: 1,
            fit_a_id: FitId::new_v4(),
            fit_a_name: "A".to_owned(),
            fit_a_item_ids: vec!["i1".to_owned(), "i2".to_owned()],
            fit_b_id: FitId::new_v4(),
            fit_b_name: "B".to_owned(),
            fit_b_item_ids: vec!["i3".to_owned()],
        };

        let poll = Poll::try_from(row).unwrap();
        assert_eq!(poll.votes, Tally::new(2, 1));
        assert_eq!(
            poll.fit_a.item_ids,
            vec![ItemId::new("i1"), ItemId::new("i2")]
        );
    }
}
