//! Integration tests for Fit Battler.
//!
//! # Running Tests
//!
//! ```bash
//! # Memory and JSON store tests
//! cargo test -p fit-battler-integration-tests
//!
//! # Include the PostgreSQL tests
//! FIT_BATTLER_TEST_DATABASE_URL=postgres://localhost/fit_battler_test \
//!     cargo test -p fit-battler-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `poll_lifecycle` - Publishing, voting, saving and closing through the services
//! - `vote_properties` - Ledger guarantees under repeated and concurrent votes
//! - `json_store` - Seed-data mode persistence across reopen
//! - `postgres_store` - The same guarantees against `PostgreSQL`
//! - `store_failures` - Rollback and degradation when the store fails or stalls
//!
//! This crate holds shared fixtures; the tests live in `tests/`.

mod faults;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use fit_battler_core::{FitDraft, Item, ItemId, PollDraft, UserId};
use fit_battler_engine::Battler;
use fit_battler_engine::catalog::StaticCatalog;
use fit_battler_engine::db::{JsonFileStore, MemoryStore, StoreError};
use fit_battler_engine::services::ServiceSettings;

pub use faults::{Fault, FaultyStore, StoreOp};

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL_VAR: &str = "FIT_BATTLER_TEST_DATABASE_URL";

/// Settings used by every fixture: three slots per fit, 20 recent polls,
/// five second store timeout.
#[must_use]
pub const fn settings() -> ServiceSettings {
    ServiceSettings {
        fit_slots: 3,
        recent_limit: 20,
        store_timeout: Duration::from_secs(5),
    }
}

/// A three-slot draft with the given item ids.
#[must_use]
pub fn draft(description: &str, fit_a: [&str; 3], fit_b: [&str; 3]) -> PollDraft {
    PollDraft {
        description: description.to_owned(),
        fit_a: FitDraft::new("", fit_a),
        fit_b: FitDraft::new("", fit_b),
    }
}

/// The "Streetwear showdown" draft used across scenarios.
#[must_use]
pub fn streetwear_draft() -> PollDraft {
    draft("Streetwear showdown", ["i1", "i2", "i3"], ["i4", "i5", "i6"])
}

#[must_use]
pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

/// Services over a fresh in-memory store.
#[must_use]
pub fn memory_battler() -> Battler<MemoryStore> {
    Battler::with_settings(MemoryStore::new(), settings())
}

/// Services over a JSON store in `dir`.
///
/// # Errors
///
/// Returns `StoreError` if the snapshot files cannot be read.
pub async fn json_battler(dir: &Path) -> Result<Battler<JsonFileStore>, StoreError> {
    let store = JsonFileStore::open(dir).await?;
    Ok(Battler::with_settings(store, settings()))
}

/// Services over a store with injectable faults and a 50ms store timeout.
#[must_use]
pub fn faulty_battler(store: FaultyStore) -> Battler<FaultyStore> {
    let settings = ServiceSettings {
        store_timeout: Duration::from_millis(50),
        ..settings()
    };
    Battler::with_settings(store, settings)
}

/// A catalog of `count` items with ids `item-0`, `item-1`, ...
#[must_use]
pub fn catalog(count: usize) -> StaticCatalog {
    let items = (0..count)
        .map(|n| Item {
            id: ItemId::new(format!("item-{n}")),
            title: format!("Item {n}"),
            image_url: format!("https://img.example/{n}.jpg"),
            price: fit_battler_core::Price::default(),
            merchant: "Northfold".to_owned(),
            category: if n % 2 == 0 { "tops" } else { "shoes" }.to_owned(),
        })
        .collect();
    StaticCatalog::new(items)
}

/// The test database URL, when one is configured.
#[must_use]
pub fn test_database_url() -> Option<SecretString> {
    std::env::var(TEST_DATABASE_URL_VAR)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .map(SecretString::from)
}
