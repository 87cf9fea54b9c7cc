//! Comments left on individual fits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CommentId, FitId, UserId};

/// A comment on a fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitComment {
    pub id: CommentId,
    pub fit_id: FitId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
