//! Fit Battler engine.
//!
//! Two-choice outfit polls: a Poll Store that publishes battles and picks the
//! next one a user has not voted on, a Vote Ledger that counts each user once
//! per poll, and a Save Index of bookmarked fits. Persistence sits behind the
//! [`db::Store`] trait with memory, JSON file and `PostgreSQL` bindings.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod services;
pub mod state;

pub use config::{BattlerConfig, ConfigError, StoreKind};
pub use error::{BattlerError, Result};
pub use state::Battler;
