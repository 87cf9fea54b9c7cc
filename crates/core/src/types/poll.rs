//! Polls, fits, vote records and saved entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{FitId, ItemId, PollId, UserId};
use super::status::{Choice, PollStatus};
use super::tally::Tally;

/// A named, ordered list of catalog item references.
///
/// Created once alongside its poll and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fit {
    pub id: FitId,
    pub name: String,
    pub item_ids: Vec<ItemId>,
}

/// A published pair of fits with an accumulating vote tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub author_id: UserId,
    pub description: String,
    pub fit_a: Fit,
    pub fit_b: Fit,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: PollStatus,
    #[serde(default)]
    pub votes: Tally,
}

impl Poll {
    /// The fit on the given side.
    #[must_use]
    pub const fn fit(&self, choice: Choice) -> &Fit {
        match choice {
            Choice::A => &self.fit_a,
            Choice::B => &self.fit_b,
        }
    }

    /// Which side `fit_id` belongs to, if either.
    #[must_use]
    pub fn side_of(&self, fit_id: FitId) -> Option<Choice> {
        Choice::ALL
            .into_iter()
            .find(|choice| self.fit(*choice).id == fit_id)
    }

    /// Whether the poll still accepts votes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PollStatus::Open
    }
}

/// One user's vote on one poll. At most one exists per `(poll_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub poll_id: PollId,
    pub user_id: UserId,
    pub choice: Choice,
    pub cast_at: DateTime<Utc>,
}

/// A user's bookmark of one fit within one poll.
///
/// `author_id` and `fit` are copied from the poll at save time for display;
/// the poll remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedEntry {
    pub poll_id: PollId,
    pub user_id: UserId,
    pub author_id: UserId,
    pub fit: Fit,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_poll() -> Poll {
        Poll {
            id: PollId::new_v4(),
            author_id: UserId::new("user1"),
            description: "Streetwear showdown".to_owned(),
            fit_a: Fit {
                id: FitId::new_v4(),
                name: "A".to_owned(),
                item_ids: vec![ItemId::new("i1"), ItemId::new("i2")],
            },
            fit_b: Fit {
                id: FitId::new_v4(),
                name: "B".to_owned(),
                item_ids: vec![ItemId::new("i3"), ItemId::new("i4")],
            },
            created_at: Utc::now(),
            status: PollStatus::Open,
            votes: Tally::default(),
        }
    }

    #[test]
    fn test_side_of() {
        let poll = sample_poll();
        assert_eq!(poll.side_of(poll.fit_a.id), Some(Choice::A));
        assert_eq!(poll.side_of(poll.fit_b.id), Some(Choice::B));
        assert_eq!(poll.side_of(FitId::new_v4()), None);
    }

    #[test]
    fn test_is_open() {
        let mut poll = sample_poll();
        assert!(poll.is_open());
        poll.status = PollStatus::Closed;
        assert!(!poll.is_open());
    }

    #[test]
    fn test_json_shape_matches_seed_files() {
        let poll = sample_poll();
        let value = serde_json::to_value(&poll).unwrap();
        assert!(value.get("fitA").is_some());
        assert!(value.get("authorId").is_some());
        assert_eq!(value["votes"]["A"], 0);
        assert_eq!(value["status"], "open");
    }
}
