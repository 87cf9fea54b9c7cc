//! Fit Battler Core - Shared domain types.
//!
//! This crate provides the types shared by every Fit Battler component:
//! - `engine` - Poll store, vote ledger, save index and persistence bindings
//! - `cli` - Command-line tools for migrations, seeding and poll management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no catalog clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, catalog items, prices, fits, polls, tallies and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
