//! Subcommand implementations.

pub mod catalog;
pub mod comment;
pub mod migrate;
pub mod poll;
pub mod save;
pub mod seed;

use fit_battler_engine::db::{Backend, BackendError};
use fit_battler_engine::{Battler, BattlerConfig};

/// Open the configured store and wire the services to it.
async fn open(config: &BattlerConfig) -> Result<Battler<Backend>, BackendError> {
    let store = Backend::open(config).await?;
    Ok(Battler::new(store, config))
}
