//! Services bundled over one store.

use std::sync::Arc;

use crate::config::BattlerConfig;
use crate::db::Store;
use crate::reconcile::TallyCache;
use crate::services::{CommentService, PollService, SaveIndex, ServiceSettings, VoteLedger};

/// Every service wired to the same store.
///
/// Cheaply cloneable via `Arc`.
#[derive(Debug)]
pub struct Battler<S> {
    inner: Arc<BattlerInner<S>>,
}

impl<S> Clone for Battler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct BattlerInner<S> {
    polls: PollService<S>,
    saves: SaveIndex<S>,
    comments: CommentService<S>,
    tallies: TallyCache,
}

impl<S: Store + Clone> Battler<S> {
    /// Wire services to `store` using values from `config`.
    pub fn new(store: S, config: &BattlerConfig) -> Self {
        Self::with_settings(store, ServiceSettings::from(config))
    }

    pub fn with_settings(store: S, settings: ServiceSettings) -> Self {
        Self {
            inner: Arc::new(BattlerInner {
                polls: PollService::new(store.clone(), settings),
                saves: SaveIndex::new(store.clone(), settings.store_timeout),
                comments: CommentService::new(store, settings.store_timeout),
                tallies: TallyCache::new(),
            }),
        }
    }

    #[must_use]
    pub fn polls(&self) -> &PollService<S> {
        &self.inner.polls
    }

    #[must_use]
    pub fn ledger(&self) -> &VoteLedger<S> {
        self.inner.polls.ledger()
    }

    #[must_use]
    pub fn saves(&self) -> &SaveIndex<S> {
        &self.inner.saves
    }

    #[must_use]
    pub fn comments(&self) -> &CommentService<S> {
        &self.inner.comments
    }

    /// The tally view shared by callers of this bundle.
    #[must_use]
    pub fn tallies(&self) -> &TallyCache {
        &self.inner.tallies
    }
}
