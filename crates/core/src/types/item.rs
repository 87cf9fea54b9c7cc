//! Catalog items.

use serde::{Deserialize, Serialize};

use super::id::ItemId;
use super::price::Price;

/// An entry from the external product catalog.
///
/// Immutable from this system's point of view: fits only hold [`ItemId`]s and
/// resolve them against the catalog at display time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub category: String,
}

impl Item {
    /// Returns true when any of `terms` occurs (case-insensitively) in the
    /// title, category or merchant.
    #[must_use]
    pub fn matches_any(&self, terms: &[String]) -> bool {
        let haystack = format!(
            "{} {} {}",
            self.title.to_lowercase(),
            self.category.to_lowercase(),
            self.merchant.to_lowercase()
        );
        terms
            .iter()
            .any(|term| haystack.contains(term.to_lowercase().as_str()))
    }
}
