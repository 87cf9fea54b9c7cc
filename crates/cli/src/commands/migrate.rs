//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! fb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FIT_BATTLER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations live in `crates/engine/migrations/` and create the `battler`
//! schema. The JSON and memory stores need no migrations.

use tracing::info;

use fit_battler_engine::BattlerConfig;
use fit_battler_engine::db::PgStore;

use crate::output::print_line;

/// Run `PostgreSQL` migrations.
///
/// # Errors
///
/// Returns an error if no database URL is configured, the connection fails or
/// a migration fails.
pub async fn run(config: &BattlerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = config.require_database_url()?;

    info!("Connecting to database...");
    let store = PgStore::connect(&database_url, config.store_timeout).await?;

    info!("Running migrations...");
    store.migrate().await?;

    info!("Migrations complete");
    print_line("Migrations complete");
    Ok(())
}
