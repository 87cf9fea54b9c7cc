//! Save Index.
//!
//! Per-user bookmarks of `(poll, fit)`, independent of voting. Entries copy
//! the poll author and fit at save time for display only.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use fit_battler_core::{FitId, PollId, SavedEntry, UserId};

use super::bounded;
use crate::db::{Store, StoreError};
use crate::error::{BattlerError, Result};

/// Membership after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveToggle {
    Saved,
    Unsaved,
}

impl SaveToggle {
    #[must_use]
    pub const fn is_saved(self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// A user's saved fits.
#[derive(Debug, Clone)]
pub struct SaveIndex<S> {
    store: S,
    timeout: Duration,
}

impl<S: Store> SaveIndex<S> {
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Whether `user_id` has saved `fit_id` of `poll_id`.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn is_saved(&self, user_id: &UserId, poll_id: PollId, fit_id: FitId) -> Result<bool> {
        let entry = bounded(self.timeout, self.store.get_saved(user_id, poll_id, fit_id)).await?;
        Ok(entry.is_some())
    }

    /// Save the fit if it is not saved, otherwise remove it.
    ///
    /// Calling this twice restores the original membership. Failures are
    /// logged and returned; membership is left as it was.
    ///
    /// # Errors
    ///
    /// - `BattlerError::NotFound` if the poll does not exist or the fit is
    ///   not one of its two fits
    /// - `BattlerError::Storage` if a store call fails or times out
    #[instrument(skip(self), fields(user_id = %user_id, poll_id = %poll_id, fit_id = %fit_id))]
    pub async fn toggle_save(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<SaveToggle> {
        self.toggle(user_id, poll_id, fit_id)
            .await
            .inspect(|state| info!(?state, "Save toggled"))
            .inspect_err(|e| error!(error = %e, "Save toggle failed"))
    }

    async fn toggle(&self, user_id: &UserId, poll_id: PollId, fit_id: FitId) -> Result<SaveToggle> {
        if self.is_saved(user_id, poll_id, fit_id).await? {
            bounded(
                self.timeout,
                self.store.delete_saved(user_id, poll_id, fit_id),
            )
            .await?;
            return Ok(SaveToggle::Unsaved);
        }

        let poll = bounded(self.timeout, self.store.get_poll(poll_id))
            .await?
            .ok_or_else(|| BattlerError::poll_not_found(poll_id))?;
        let side = poll
            .side_of(fit_id)
            .ok_or_else(|| BattlerError::NotFound(format!("fit {fit_id} in poll {poll_id}")))?;

        let entry = SavedEntry {
            poll_id,
            user_id: user_id.clone(),
            author_id: poll.author_id.clone(),
            fit: poll.fit(side).clone(),
            saved_at: Utc::now(),
        };

        match bounded(self.timeout, self.store.insert_saved(&entry)).await {
            Ok(()) => Ok(SaveToggle::Saved),
            // A concurrent toggle saved it first; the fit is saved either way
            Err(StoreError::Conflict(reason)) => {
                debug!(%reason, "Fit already saved");
                Ok(SaveToggle::Saved)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Everything `user_id` has saved, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn saved_entries(&self, user_id: &UserId) -> Result<Vec<SavedEntry>> {
        Ok(bounded(self.timeout, self.store.list_saved(user_id)).await?)
    }
}
