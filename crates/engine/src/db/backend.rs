//! Runtime selection between the store bindings.

use std::collections::HashSet;

use tracing::info;

use fit_battler_core::{
    Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, UserId, VoteRecord,
};

use super::{JsonFileStore, MemoryStore, PgStore, PollQuery, Store, StoreError, VoteInsert};
use crate::config::{BattlerConfig, ConfigError, StoreKind};

/// Errors raised while opening the configured backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One of the three store bindings, chosen from configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    Memory(MemoryStore),
    Json(JsonFileStore),
    Postgres(PgStore),
}

impl Backend {
    /// Open the store named by `config.store`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the Postgres URL is missing and
    /// `BackendError::Store` if the store cannot be opened.
    pub async fn open(config: &BattlerConfig) -> Result<Self, BackendError> {
        let backend = match config.store {
            StoreKind::Memory => Self::Memory(MemoryStore::new()),
            StoreKind::Json => Self::Json(JsonFileStore::open(&config.data_dir).await?),
            StoreKind::Postgres => {
                let url = config.require_database_url()?;
                Self::Postgres(PgStore::connect(&url, config.store_timeout).await?)
            }
        };
        info!(store = %config.store, "Store ready");
        Ok(backend)
    }

    /// Which binding this is.
    #[must_use]
    pub const fn kind(&self) -> StoreKind {
        match self {
            Self::Memory(_) => StoreKind::Memory,
            Self::Json(_) => StoreKind::Json,
            Self::Postgres(_) => StoreKind::Postgres,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Backend::Memory($store) => $call.await,
            Backend::Json($store) => $call.await,
            Backend::Postgres($store) => $call.await,
        }
    };
}

impl Store for Backend {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        delegate!(self, s => s.insert_poll(poll))
    }

    async fn get_poll(&self, id: PollId) -> Result<Option<Poll>, StoreError> {
        delegate!(self, s => s.get_poll(id))
    }

    async fn get_fit(&self, id: FitId) -> Result<Option<Fit>, StoreError> {
        delegate!(self, s => s.get_fit(id))
    }

    async fn list_polls(&self, query: PollQuery) -> Result<Vec<Poll>, StoreError> {
        delegate!(self, s => s.list_polls(query))
    }

    async fn set_poll_status(&self, id: PollId, status: PollStatus) -> Result<bool, StoreError> {
        delegate!(self, s => s.set_poll_status(id, status))
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<VoteInsert, StoreError> {
        delegate!(self, s => s.record_vote(vote))
    }

    async fn get_vote(
        &self,
        poll_id: PollId,
        user_id: &UserId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        delegate!(self, s => s.get_vote(poll_id, user_id))
    }

    async fn voted_poll_ids(&self, user_id: &UserId) -> Result<HashSet<PollId>, StoreError> {
        delegate!(self, s => s.voted_poll_ids(user_id))
    }

    async fn insert_saved(&self, entry: &SavedEntry) -> Result<(), StoreError> {
        delegate!(self, s => s.insert_saved(entry))
    }

    async fn delete_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<bool, StoreError> {
        delegate!(self, s => s.delete_saved(user_id, poll_id, fit_id))
    }

    async fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Result<Option<SavedEntry>, StoreError> {
        delegate!(self, s => s.get_saved(user_id, poll_id, fit_id))
    }

    async fn list_saved(&self, user_id: &UserId) -> Result<Vec<SavedEntry>, StoreError> {
        delegate!(self, s => s.list_saved(user_id))
    }

    async fn insert_comment(&self, comment: &FitComment) -> Result<(), StoreError> {
        delegate!(self, s => s.insert_comment(comment))
    }

    async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>, StoreError> {
        delegate!(self, s => s.list_comments(fit_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = BattlerConfig {
            store: StoreKind::Memory,
            ..BattlerConfig::default()
        };
        let backend = Backend::open(&config).await.unwrap();
        assert_eq!(backend.kind(), StoreKind::Memory);
        assert!(
            backend
                .list_polls(PollQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_open_postgres_without_url_fails() {
        let config = BattlerConfig {
            store: StoreKind::Postgres,
            database_url: None,
            ..BattlerConfig::default()
        };
        // Only meaningful when no URL leaks in from the environment
        if std::env::var("FIT_BATTLER_DATABASE_URL").is_err()
            && std::env::var("DATABASE_URL").is_err()
        {
            assert!(matches!(
                Backend::open(&config).await,
                Err(BackendError::Config(ConfigError::MissingEnvVar(_)))
            ));
        }
    }
}
