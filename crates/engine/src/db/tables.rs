//! In-process tables shared by the memory and JSON file bindings.
//!
//! All methods are synchronous; callers hold a lock for the duration of one
//! call, which is what makes `record_vote` atomic for these bindings.

use std::collections::{HashMap, HashSet};

use fit_battler_core::{
    Fit, FitComment, FitId, Poll, PollId, PollStatus, SavedEntry, Tally, UserId, VoteRecord,
};

use super::{PollQuery, StoreError, VoteInsert};

#[derive(Debug, Clone, Default)]
pub(super) struct Tables {
    /// Insertion order; the index doubles as a creation-order tiebreak.
    polls: Vec<Poll>,
    poll_index: HashMap<PollId, usize>,
    votes: HashMap<(PollId, UserId), VoteRecord>,
    saved: Vec<SavedEntry>,
    comments: Vec<FitComment>,
}

/// Raw collections as they are written to disk.
#[derive(Debug, Default)]
pub(super) struct Collections {
    pub polls: Vec<Poll>,
    pub votes: Vec<VoteRecord>,
    pub saved: Vec<SavedEntry>,
    pub comments: Vec<FitComment>,
}

impl Tables {
    /// Rebuild tables from persisted collections.
    ///
    /// Tallies are re-derived from the vote ledger so that a hand-edited
    /// snapshot cannot double count.
    pub(super) fn from_collections(collections: Collections) -> Result<Self, StoreError> {
        let mut tables = Self::default();
        for poll in collections.polls {
            tables.insert_poll(poll)?;
        }

        let mut counted: HashMap<PollId, Tally> = HashMap::new();
        for vote in collections.votes {
            if !tables.poll_index.contains_key(&vote.poll_id) {
                return Err(StoreError::DataCorruption(format!(
                    "vote references unknown poll {}",
                    vote.poll_id
                )));
            }
            let key = (vote.poll_id, vote.user_id.clone());
            if tables.votes.contains_key(&key) {
                return Err(StoreError::DataCorruption(format!(
                    "duplicate vote by {} on poll {}",
                    vote.user_id, vote.poll_id
                )));
            }
            let tally = counted.entry(vote.poll_id).or_default();
            *tally = tally.incremented(vote.choice);
            tables.votes.insert(key, vote);
        }

        for poll in &mut tables.polls {
            let derived = counted.get(&poll.id).copied().unwrap_or_default();
            if poll.votes != derived {
                tracing::warn!(
                    poll_id = %poll.id,
                    stored = ?poll.votes,
                    derived = ?derived,
                    "Stored tally disagrees with vote ledger, using ledger"
                );
                poll.votes = derived;
            }
        }

        tables.saved = collections.saved;
        tables.comments = collections.comments;
        Ok(tables)
    }

    /// Snapshot the tables for writing.
    pub(super) fn to_collections(&self) -> Collections {
        let mut votes: Vec<VoteRecord> = self.votes.values().cloned().collect();
        votes.sort_by(|a, b| {
            a.cast_at
                .cmp(&b.cast_at)
                .then_with(|| a.poll_id.cmp(&b.poll_id))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Collections {
            polls: self.polls.clone(),
            votes,
            saved: self.saved.clone(),
            comments: self.comments.clone(),
        }
    }

    pub(super) fn insert_poll(&mut self, poll: Poll) -> Result<(), StoreError> {
        if self.poll_index.contains_key(&poll.id) {
            return Err(StoreError::Conflict(format!("poll {} already exists", poll.id)));
        }
        let fit_taken = |fit: &Fit| self.find_fit(fit.id).is_some();
        if fit_taken(&poll.fit_a) || fit_taken(&poll.fit_b) || poll.fit_a.id == poll.fit_b.id {
            return Err(StoreError::Conflict(format!(
                "fit ids of poll {} are already in use",
                poll.id
            )));
        }
        self.poll_index.insert(poll.id, self.polls.len());
        self.polls.push(poll);
        Ok(())
    }

    pub(super) fn get_poll(&self, id: PollId) -> Option<Poll> {
        self.poll(id).cloned()
    }

    pub(super) fn get_fit(&self, id: FitId) -> Option<Fit> {
        self.find_fit(id).cloned()
    }

    pub(super) fn list_polls(&self, query: PollQuery) -> Vec<Poll> {
        let mut polls: Vec<&Poll> = self
            .polls
            .iter()
            .rev()
            .filter(|poll| query.status.is_none_or(|status| poll.status == status))
            .collect();
        // Stable sort keeps later insertions first among equal timestamps
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        polls
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(super) fn set_poll_status(&mut self, id: PollId, status: PollStatus) -> bool {
        match self.poll_mut(id) {
            Some(poll) => {
                poll.status = status;
                true
            }
            None => false,
        }
    }

    pub(super) fn record_vote(&mut self, vote: &VoteRecord) -> VoteInsert {
        let key = (vote.poll_id, vote.user_id.clone());
        let existing = self.votes.get(&key).map(|record| record.choice);
        let Some(poll) = self.poll_mut(vote.poll_id) else {
            return VoteInsert::PollMissing;
        };
        if let Some(existing) = existing {
            return VoteInsert::Duplicate {
                existing,
                tally: poll.votes,
            };
        }
        if poll.status == PollStatus::Closed {
            return VoteInsert::PollClosed;
        }
        poll.votes = poll.votes.incremented(vote.choice);
        let tally = poll.votes;
        self.votes.insert(key, vote.clone());
        VoteInsert::Recorded(tally)
    }

    pub(super) fn get_vote(&self, poll_id: PollId, user_id: &UserId) -> Option<VoteRecord> {
        self.votes.get(&(poll_id, user_id.clone())).cloned()
    }

    pub(super) fn voted_poll_ids(&self, user_id: &UserId) -> HashSet<PollId> {
        self.votes
            .values()
            .filter(|vote| &vote.user_id == user_id)
            .map(|vote| vote.poll_id)
            .collect()
    }

    pub(super) fn insert_saved(&mut self, entry: &SavedEntry) -> Result<(), StoreError> {
        if self
            .saved_position(&entry.user_id, entry.poll_id, entry.fit.id)
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "fit {} of poll {} already saved",
                entry.fit.id, entry.poll_id
            )));
        }
        self.saved.push(entry.clone());
        Ok(())
    }

    pub(super) fn delete_saved(&mut self, user_id: &UserId, poll_id: PollId, fit_id: FitId) -> bool {
        match self.saved_position(user_id, poll_id, fit_id) {
            Some(position) => {
                self.saved.remove(position);
                true
            }
            None => false,
        }
    }

    pub(super) fn get_saved(
        &self,
        user_id: &UserId,
        poll_id: PollId,
        fit_id: FitId,
    ) -> Option<SavedEntry> {
        self.saved_position(user_id, poll_id, fit_id)
            .and_then(|position| self.saved.get(position))
            .cloned()
    }

    pub(super) fn list_saved(&self, user_id: &UserId) -> Vec<SavedEntry> {
        let mut entries: Vec<SavedEntry> = self
            .saved
            .iter()
            .rev()
            .filter(|entry| &entry.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        entries
    }

    pub(super) fn insert_comment(&mut self, comment: &FitComment) -> Result<(), StoreError> {
        if self.find_fit(comment.fit_id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.comments.push(comment.clone());
        Ok(())
    }

    pub(super) fn list_comments(&self, fit_id: FitId) -> Vec<FitComment> {
        let mut comments: Vec<FitComment> = self
            .comments
            .iter()
            .filter(|comment| comment.fit_id == fit_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        comments
    }

    fn poll(&self, id: PollId) -> Option<&Poll> {
        self.poll_index
            .get(&id)
            .and_then(|&index| self.polls.get(index))
    }

    fn poll_mut(&mut self, id: PollId) -> Option<&mut Poll> {
        let index = *self.poll_index.get(&id)?;
        self.polls.get_mut(index)
    }

    fn find_fit(&self, id: FitId) -> Option<&Fit> {
        self.polls.iter().find_map(|poll| {
            if poll.fit_a.id == id {
                Some(&poll.fit_a)
            } else if poll.fit_b.id == id {
                Some(&poll.fit_b)
            } else {
                None
            }
        })
    }

    fn saved_position(&self, user_id: &UserId, poll_id: PollId, fit_id: FitId) -> Option<usize> {
        self.saved.iter().position(|entry| {
            &entry.user_id == user_id && entry.poll_id == poll_id && entry.fit.id == fit_id
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use fit_battler_core::{Choice, ItemId};

    use super::*;

    fn poll_at(offset_secs: i64) -> Poll {
        Poll {
            id: PollId::new_v4(),
            author_id: UserId::new("author"),
            description: "battle".to_owned(),
            fit_a: Fit {
                id: FitId::new_v4(),
                name: "A".to_owned(),
                item_ids: vec![ItemId::new("i1")],
            },
            fit_b: Fit {
                id: FitId::new_v4(),
                name: "B".to_owned(),
                item_ids: vec![ItemId::new("i2")],
            },
            created_at: Utc::now() + Duration::seconds(offset_secs),
            status: PollStatus::Open,
            votes: Tally::default(),
        }
    }

    fn vote(poll_id: PollId, user: &str, choice: Choice) -> VoteRecord {
        VoteRecord {
            poll_id,
            user_id: UserId::new(user),
            choice,
            cast_at: Utc::now(),
        }
    }

    #[test]
    fn test_list_polls_newest_first() {
        let mut tables = Tables::default();
        let old = poll_at(-60);
        let new = poll_at(0);
        tables.insert_poll(new.clone()).unwrap();
        tables.insert_poll(old.clone()).unwrap();

        let ids: Vec<PollId> = tables
            .list_polls(PollQuery::default())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[test]
    fn test_equal_timestamps_prefer_later_insert() {
        let mut tables = Tables::default();
        let first = poll_at(0);
        let mut second = poll_at(0);
        second.created_at = first.created_at;
        tables.insert_poll(first.clone()).unwrap();
        tables.insert_poll(second.clone()).unwrap();

        let listed = tables.list_polls(PollQuery::recent(1));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().unwrap().id, second.id);
    }

    #[test]
    fn test_record_vote_is_idempotent_per_user() {
        let mut tables = Tables::default();
        let poll = poll_at(0);
        tables.insert_poll(poll.clone()).unwrap();

        let first = tables.record_vote(&vote(poll.id, "x", Choice::A));
        let second = tables.record_vote(&vote(poll.id, "x", Choice::B));

        assert_eq!(first, VoteInsert::Recorded(Tally::new(1, 0)));
        assert_eq!(
            second,
            VoteInsert::Duplicate {
                existing: Choice::A,
                tally: Tally::new(1, 0)
            }
        );
    }

    #[test]
    fn test_record_vote_on_closed_poll() {
        let mut tables = Tables::default();
        let poll = poll_at(0);
        tables.insert_poll(poll.clone()).unwrap();
        tables.set_poll_status(poll.id, PollStatus::Closed);

        let result = tables.record_vote(&vote(poll.id, "x", Choice::A));
        assert_eq!(result, VoteInsert::PollClosed);
        assert!(tables.get_vote(poll.id, &UserId::new("x")).is_none());
    }

    #[test]
    fn test_record_vote_missing_poll() {
        let mut tables = Tables::default();
        let result = tables.record_vote(&vote(PollId::new_v4(), "x", Choice::A));
        assert_eq!(result, VoteInsert::PollMissing);
    }

    #[test]
    fn test_from_collections_rederives_tallies() {
        let mut poll = poll_at(0);
        poll.votes = Tally::new(40, 2);
        let collections = Collections {
            votes: vec![vote(poll.id, "x", Choice::B)],
            polls: vec![poll.clone()],
            ..Collections::default()
        };

        let tables = Tables::from_collections(collections).unwrap();
        assert_eq!(tables.get_poll(poll.id).unwrap().votes, Tally::new(0, 1));
    }

    #[test]
    fn test_from_collections_rejects_duplicate_votes() {
        let poll = poll_at(0);
        let collections = Collections {
            votes: vec![vote(poll.id, "x", Choice::B), vote(poll.id, "x", Choice::A)],
            polls: vec![poll],
            ..Collections::default()
        };
        assert!(matches!(
            Tables::from_collections(collections),
            Err(StoreError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_duplicate_poll_rejected() {
        let mut tables = Tables::default();
        let poll = poll_at(0);
        tables.insert_poll(poll.clone()).unwrap();
        assert!(matches!(
            tables.insert_poll(poll),
            Err(StoreError::Conflict(_))
        ));
    }
}
