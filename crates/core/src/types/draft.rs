//! Unvalidated poll input and its validation rules.

use serde::{Deserialize, Serialize};

use super::status::Choice;

/// Errors raised when user input cannot be published.
///
/// Validation errors are never retried; they are surfaced to the caller as-is.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The poll description is empty or whitespace-only.
    #[error("description cannot be empty")]
    EmptyDescription,
    /// A fit has unfilled slots or fewer slots than required.
    #[error("fit {side} has {populated} of {required} item slots filled")]
    IncompleteFit {
        /// Which fit is incomplete.
        side: Choice,
        /// Number of slots holding an item id.
        populated: usize,
        /// Number of slots that must be filled.
        required: usize,
    },
    /// A comment body is empty or whitespace-only.
    #[error("comment cannot be empty")]
    EmptyCommentBody,
}

/// A fit as picked by the user, before it is persisted.
///
/// Slots are item ids in display order; a blank id is an unfilled slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitDraft {
    #[serde(default)]
    pub name: String,
    pub item_ids: Vec<String>,
}

impl FitDraft {
    /// Create a draft from a name and item ids.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, item_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            item_ids: item_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of slots holding a non-blank item id.
    #[must_use]
    pub fn populated_slots(&self) -> usize {
        self.item_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .count()
    }

    /// The display name, falling back to the side label when blank.
    #[must_use]
    pub fn display_name(&self, side: Choice) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            side.to_string()
        } else {
            name.to_owned()
        }
    }

    fn validate(&self, side: Choice, required_slots: usize) -> Result<(), ValidationError> {
        let populated = self.populated_slots();
        let required = required_slots.max(self.item_ids.len());
        if populated < required {
            return Err(ValidationError::IncompleteFit {
                side,
                populated,
                required,
            });
        }
        Ok(())
    }
}

/// Everything the author submits when publishing a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDraft {
    pub description: String,
    pub fit_a: FitDraft,
    pub fit_b: FitDraft,
}

impl PollDraft {
    /// Check the draft can be published.
    ///
    /// Every slot of both fits must be filled and each fit must have at least
    /// `required_slots` slots.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking the description
    /// first, then fit A, then fit B.
    pub fn validate(&self, required_slots: usize) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        self.fit_a.validate(Choice::A, required_slots)?;
        self.fit_b.validate(Choice::B, required_slots)?;
        Ok(())
    }

    /// The draft for one side.
    #[must_use]
    pub const fn fit(&self, side: Choice) -> &FitDraft {
        match side {
            Choice::A => &self.fit_a,
            Choice::B => &self.fit_b,
        }
    }
}

/// Check a comment body is publishable.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyCommentBody`] for blank input.
pub fn validate_comment_body(body: &str) -> Result<(), ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::EmptyCommentBody);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(description: &str, a: &[&str], b: &[&str]) -> PollDraft {
        PollDraft {
            description: description.to_owned(),
            fit_a: FitDraft::new("A", a.iter().copied()),
            fit_b: FitDraft::new("B", b.iter().copied()),
        }
    }

    #[test]
    fn test_valid_draft() {
        let d = draft("Streetwear showdown", &["i1", "i2", "i3"], &["i4", "i5", "i6"]);
        assert_eq!(d.validate(3), Ok(()));
    }

    #[test]
    fn test_empty_description() {
        let d = draft("", &["i1", "i2", "i3"], &["i4", "i5", "i6"]);
        assert_eq!(d.validate(3), Err(ValidationError::EmptyDescription));
    }

    #[test]
    fn test_whitespace_description() {
        let d = draft("   \t", &["i1", "i2", "i3"], &["i4", "i5", "i6"]);
        assert_eq!(d.validate(3), Err(ValidationError::EmptyDescription));
    }

    #[test]
    fn test_blank_slot_rejected() {
        let d = draft("x", &["i1", "", "i3"], &["i4", "i5", "i6"]);
        assert_eq!(
            d.validate(3),
            Err(ValidationError::IncompleteFit {
                side: Choice::A,
                populated: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_too_few_slots_rejected() {
        let d = draft("x", &["i1", "i2", "i3"], &["i4", "i5"]);
        assert!(matches!(
            d.validate(3),
            Err(ValidationError::IncompleteFit {
                side: Choice::B,
                ..
            })
        ));
    }

    #[test]
    fn test_extra_slots_must_be_filled_too() {
        let d = draft("x", &["i1", "i2", "i3", " "], &["i4", "i5", "i6"]);
        assert!(d.validate(3).is_err());
    }

    #[test]
    fn test_display_name_fallback() {
        let fit = FitDraft::new("  ", ["i1"]);
        assert_eq!(fit.display_name(Choice::B), "B");
        let fit = FitDraft::new("Cozy", ["i1"]);
        assert_eq!(fit.display_name(Choice::A), "Cozy");
    }

    #[test]
    fn test_comment_body() {
        assert!(validate_comment_body("nice fit").is_ok());
        assert_eq!(
            validate_comment_body("  "),
            Err(ValidationError::EmptyCommentBody)
        );
    }
}
