//! Service-level errors.
//!
//! Every service method returns `Result<T, BattlerError>`. Validation errors
//! are final; storage errors may be retried by the caller when
//! [`BattlerError::is_retryable`] says so. Nothing in this crate retries.

use thiserror::Error;

use fit_battler_core::{PollId, ValidationError};

use crate::db::StoreError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum BattlerError {
    /// Input rejected before anything was persisted.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The poll no longer accepts votes.
    #[error("Poll {0} is closed")]
    PollClosed(PollId),

    /// Persistence provider failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl BattlerError {
    /// Whether offering the user a "try again" makes sense.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_retryable(),
            Self::Validation(_) | Self::NotFound(_) | Self::PollClosed(_) => false,
        }
    }

    pub(crate) fn poll_not_found(id: PollId) -> Self {
        Self::NotFound(format!("poll {id}"))
    }
}

/// Result type alias for `BattlerError`.
pub type Result<T> = std::result::Result<T, BattlerError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let err = BattlerError::from(StoreError::Timeout(Duration::from_secs(10)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = BattlerError::from(ValidationError::EmptyDescription);
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Validation error"));
    }

    #[test]
    fn test_conflict_is_not_retryable() {
        let err = BattlerError::from(StoreError::Conflict("saved fit already exists".to_owned()));
        assert!(!err.is_retryable());
    }
}
