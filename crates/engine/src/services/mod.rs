//! Business logic services.
//!
//! # Services
//!
//! - `polls` - Poll Store: create, fetch, list, pick the next poll to vote on, close
//! - `ledger` - Vote Ledger: one vote per user per poll, sole writer of tallies
//! - `saves` - Save Index: per-user bookmarks of (poll, fit)
//! - `comments` - Comments on fits
//! - `synth` - Random battle synthesizer used when a voter runs out of polls
//!
//! Every service is generic over [`Store`](crate::db::Store) and bounds each
//! store call with the configured timeout. None of them retry.

pub mod comments;
pub mod ledger;
pub mod polls;
pub mod saves;
pub mod synth;

use std::future::Future;
use std::time::Duration;

use crate::config::BattlerConfig;
use crate::db::StoreError;

pub use comments::CommentService;
pub use ledger::{VoteLedger, VoteOutcome, VoteResult};
pub use polls::{PollService, VoteReceipt};
pub use saves::{SaveIndex, SaveToggle};
pub use synth::{PollSynthesizer, RandomBattle, SynthesisError};

/// Knobs shared by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Item slots each fit must fill
    pub fit_slots: usize,
    /// Default size of the recent polls window
    pub recent_limit: usize,
    /// Upper bound on each store call
    pub store_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&BattlerConfig::default())
    }
}

impl From<&BattlerConfig> for ServiceSettings {
    fn from(config: &BattlerConfig) -> Self {
        Self {
            fit_slots: config.fit_slots,
            recent_limit: config.recent_limit,
            store_timeout: config.store_timeout,
        }
    }
}

/// Run a store call, failing with [`StoreError::Timeout`] once `limit` elapses.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
