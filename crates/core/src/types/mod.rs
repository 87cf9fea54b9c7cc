//! Core types for Fit Battler.
//!
//! This module provides type-safe wrappers for the poll domain.

pub mod comment;
pub mod draft;
pub mod id;
pub mod item;
pub mod poll;
pub mod price;
pub mod status;
pub mod tally;

pub use comment::FitComment;
pub use draft::{FitDraft, PollDraft, ValidationError, validate_comment_body};
pub use id::*;
pub use item::Item;
pub use poll::{Fit, Poll, SavedEntry, VoteRecord};
pub use price::{CurrencyCode, Price, PriceError};
pub use status::*;
pub use tally::Tally;
