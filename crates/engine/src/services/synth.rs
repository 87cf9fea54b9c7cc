//! Poll synthesis for voters who have run out of polls.
//!
//! The Poll Store knows nothing about the catalog. When no unvoted poll is
//! left, a caller may hand it a [`PollSynthesizer`] that drafts a fresh
//! battle; the store then validates and persists that draft like any other.

use std::future::Future;

use rand::seq::IndexedRandom;
use thiserror::Error;
use tracing::debug;

use fit_battler_core::{FitDraft, Item, PollDraft, UserId};

use crate::catalog::{Catalog, CatalogError};

const DESCRIPTIONS: &[&str] = &[
    "Random battle: which fit wins?",
    "Shuffle showdown",
    "Pick your side",
    "Wildcard matchup",
];

/// Author id stamped on synthesized polls unless overridden.
pub const DEFAULT_SYNTH_AUTHOR: &str = "fit_battler";

/// Errors raised while drafting a synthetic poll.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("catalog has {available} items, need {needed} for a battle")]
    NotEnoughItems { needed: usize, available: usize },
}

/// Drafts a new poll on demand.
pub trait PollSynthesizer: Send + Sync {
    /// The user recorded as author of synthesized polls.
    fn author_id(&self) -> UserId;

    /// Draft a poll whose fits each have `fit_slots` items.
    fn synthesize(
        &self,
        fit_slots: usize,
    ) -> impl Future<Output = Result<PollDraft, SynthesisError>> + Send;
}

/// Builds a battle from distinct random catalog items.
///
/// Items are drawn from [`Catalog::popular`]; no item appears in both fits.
#[derive(Debug, Clone)]
pub struct RandomBattle<C> {
    catalog: C,
    author_id: UserId,
}

impl<C: Catalog> RandomBattle<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            author_id: UserId::new(DEFAULT_SYNTH_AUTHOR),
        }
    }

    #[must_use]
    pub fn with_author(mut self, author_id: UserId) -> Self {
        self.author_id = author_id;
        self
    }
}

fn draft_from(items: &[Item], fit_slots: usize) -> Result<PollDraft, SynthesisError> {
    let needed = fit_slots.saturating_mul(2);
    if items.len() < needed || fit_slots == 0 {
        return Err(SynthesisError::NotEnoughItems {
            needed,
            available: items.len(),
        });
    }

    let mut rng = rand::rng();
    let picked: Vec<&Item> = items.choose_multiple(&mut rng, needed).collect();
    let description = DESCRIPTIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or("Random battle");

    let (a, b) = picked.split_at(fit_slots);
    let ids = |side: &[&Item]| -> Vec<String> {
        side.iter().map(|item| item.id.as_str().to_owned()).collect()
    };

    Ok(PollDraft {
        description: description.to_owned(),
        fit_a: FitDraft::new("A", ids(a)),
        fit_b: FitDraft::new("B", ids(b)),
    })
}

impl<C: Catalog> PollSynthesizer for RandomBattle<C> {
    fn author_id(&self) -> UserId {
        self.author_id.clone()
    }

    async fn synthesize(&self, fit_slots: usize) -> Result<PollDraft, SynthesisError> {
        let items = self.catalog.popular().await?;
        let draft = draft_from(&items, fit_slots)?;
        debug!(description = %draft.description, "Synthesized random battle");
        Ok(draft)
    }
}
