//! Per-poll vote counts.

use serde::{Deserialize, Serialize};

use super::status::Choice;

/// Vote counts for both sides of a poll.
///
/// The sum of both sides equals the number of distinct users holding a vote
/// record for the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tally {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
}

impl Tally {
    /// Create a tally from explicit counts.
    #[must_use]
    pub const fn new(a: u64, b: u64) -> Self {
        Self { a, b }
    }

    /// Total number of votes cast.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.a.saturating_add(self.b)
    }

    /// Count for one side.
    #[must_use]
    pub const fn get(&self, choice: Choice) -> u64 {
        match choice {
            Choice::A => self.a,
            Choice::B => self.b,
        }
    }

    /// Return a copy with one more vote on `choice`.
    #[must_use]
    pub const fn incremented(self, choice: Choice) -> Self {
        match choice {
            Choice::A => Self::new(self.a.saturating_add(1), self.b),
            Choice::B => Self::new(self.a, self.b.saturating_add(1)),
        }
    }

    /// Per-side maximum of two tallies.
    ///
    /// Tallies only ever grow, so a reader merging an older and a newer view
    /// keeps whichever side has seen more votes.
    #[must_use]
    pub fn merge_monotonic(self, other: Self) -> Self {
        Self::new(self.a.max(other.a), self.b.max(other.b))
    }

    /// Rounded percentages `(a, b)` that always sum to 100.
    ///
    /// Returns `(0, 0)` when nobody has voted yet.
    #[must_use]
    pub fn percentages(&self) -> (u8, u8) {
        let total = self.total();
        if total == 0 {
            return (0, 0);
        }
        // Integer round-half-up of a * 100 / total
        let a_pct = (u128::from(self.a) * 200 + u128::from(total)) / (u128::from(total) * 2);
        let a_pct = u8::try_from(a_pct).unwrap_or(100);
        (a_pct, 100 - a_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_empty() {
        assert_eq!(Tally::default().percentages(), (0, 0));
    }

    #[test]
    fn test_percentages_split() {
        assert_eq!(Tally::new(1, 1).percentages(), (50, 50));
        assert_eq!(Tally::new(1, 2).percentages(), (33, 67));
        assert_eq!(Tally::new(2, 1).percentages(), (67, 33));
        assert_eq!(Tally::new(3, 0).percentages(), (100, 0));
    }

    #[test]
    fn test_percentages_round_half_up() {
        // 1/8 = 12.5% rounds up to 13
        assert_eq!(Tally::new(1, 7).percentages(), (13, 87));
    }

    #[test]
    fn test_increment_and_total() {
        let tally = Tally::default()
            .incremented(Choice::A)
            .incremented(Choice::B)
            .incremented(Choice::A);
        assert_eq!(tally, Tally::new(2, 1));
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.get(Choice::B), 1);
    }

    #[test]
    fn test_merge_monotonic() {
        let merged = Tally::new(3, 1).merge_monotonic(Tally::new(2, 4));
        assert_eq!(merged, Tally::new(3, 4));
    }

    #[test]
    fn test_serde_uses_side_names() {
        let json = serde_json::to_string(&Tally::new(1, 0)).unwrap_or_default();
        assert_eq!(json, r#"{"A":1,"B":0}"#);
    }
}
