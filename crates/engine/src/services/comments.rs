//! Comments on fits.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};

use fit_battler_core::{CommentId, FitComment, FitId, UserId, validate_comment_body};

use super::bounded;
use crate::db::{Store, StoreError};
use crate::error::{BattlerError, Result};

#[derive(Debug, Clone)]
pub struct CommentService<S> {
    store: S,
    timeout: Duration,
}

impl<S: Store> CommentService<S> {
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Post a comment on a fit.
    ///
    /// # Errors
    ///
    /// - `BattlerError::Validation` if the body is blank
    /// - `BattlerError::NotFound` if the fit does not exist
    /// - `BattlerError::Storage` if the store call fails or times out
    #[instrument(skip(self, body), fields(fit_id = %fit_id, author_id = %author_id))]
    pub async fn add_comment(
        &self,
        fit_id: FitId,
        author_id: &UserId,
        body: &str,
    ) -> Result<FitComment> {
        validate_comment_body(body)?;

        let comment = FitComment {
            id: CommentId::new_v4(),
            fit_id,
            author_id: author_id.clone(),
            body: body.trim().to_owned(),
            created_at: Utc::now(),
        };

        match bounded(self.timeout, self.store.insert_comment(&comment)).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(BattlerError::NotFound(format!("fit {fit_id}")));
            }
            Err(e) => return Err(e.into()),
        }

        info!(comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Comments on a fit, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BattlerError::Storage` if the store call fails or times out.
    pub async fn list_comments(&self, fit_id: FitId) -> Result<Vec<FitComment>> {
        Ok(bounded(self.timeout, self.store.list_comments(fit_id)).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fit_battler_core::{Fit, ItemId, Poll, PollId, PollStatus, Tally};

    use super::*;
    use crate::db::MemoryStore;

    async fn service_with_fit() -> (CommentService<MemoryStore>, FitId) {
        let store = MemoryStore::new();
        let fit_id = FitId::new_v4();
        let poll = Poll {
            id: PollId::new_v4(),
            author_id: UserId::new("user1"),
            description: "battle".to_owned(),
            fit_a: Fit {
                id: fit_id,
                name: "A".to_owned(),
                item_ids: vec![ItemId::new("i1")],
            },
            fit_b: Fit {
                id: FitId::new_v4(),
                name: "B".to_owned(),
                item_ids: vec![ItemId::new("i2")],
            },
            created_at: Utc::now(),
            status: PollStatus::Open,
            votes: Tally::default(),
        };
        store.insert_poll(&poll).await.unwrap();
        (CommentService::new(store, Duration::from_secs(5)), fit_id)
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let (comments, fit_id) = service_with_fit().await;
        let user = UserId::new("userX");
        comments.add_comment(fit_id, &user, "love the coat").await.unwrap();
        comments.add_comment(fit_id, &user, " shoes tho ").await.unwrap();

        let listed = comments.list_comments(fit_id).await.unwrap();
        let bodies: Vec<&str> = listed.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["love the coat", "shoes tho"]);
    }

    #[tokio::test]
    async fn test_blank_comment_rejected() {
        let (comments, fit_id) = service_with_fit().await;
        let err = comments
            .add_comment(fit_id, &UserId::new("userX"), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, BattlerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_comment_on_unknown_fit() {
        let (comments, _) = service_with_fit().await;
        let err = comments
            .add_comment(FitId::new_v4(), &UserId::new("userX"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, BattlerError::NotFound(_)));
    }
}
