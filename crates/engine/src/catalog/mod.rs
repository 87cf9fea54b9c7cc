//! Product catalog contract.
//!
//! The catalog is an external collaborator: this crate only reads items from
//! it, by search or by id, to fill fit slots and render fits. Search results
//! carry no ordering guarantee beyond best-effort relevance.

mod cached;
mod static_catalog;

use std::future::Future;

use thiserror::Error;
use tracing::warn;

use fit_battler_core::{Fit, Item, ItemId};

pub use cached::CachedCatalog;
pub use static_catalog::StaticCatalog;

/// Errors from a catalog provider.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("catalog i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog JSON was malformed.
    #[error("catalog parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog YAML was malformed.
    #[error("catalog parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The provider could not answer.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the product catalog.
pub trait Catalog: Send + Sync {
    /// Items matching `query`, at most `limit`.
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Item>, CatalogError>> + Send;

    /// A default selection shown when a search comes back empty.
    fn popular(&self) -> impl Future<Output = Result<Vec<Item>, CatalogError>> + Send;

    /// Look up items by id. Unknown ids are skipped.
    fn get(&self, ids: &[ItemId]) -> impl Future<Output = Result<Vec<Item>, CatalogError>> + Send;
}

/// Candidates for one fit slot.
///
/// Falls back to [`Catalog::popular`] when the search is empty or fails, and
/// to an empty list when that fails too. Never errors.
pub async fn slot_candidates<C: Catalog>(catalog: &C, query: &str, limit: usize) -> Vec<Item> {
    match catalog.search(query, limit).await {
        Ok(items) if !items.is_empty() => return items,
        Ok(_) => {}
        Err(e) => warn!(error = %e, query, "Catalog search failed, using popular items"),
    }

    match catalog.popular().await {
        Ok(mut items) => {
            items.truncate(limit);
            items
        }
        Err(e) => {
            warn!(error = %e, "Catalog popular items unavailable");
            Vec::new()
        }
    }
}

/// Resolve a fit's slots against the catalog, in slot order.
///
/// Ids the catalog does not know come back as `None` and render as empty
/// slots. A catalog failure resolves every slot to `None`.
pub async fn resolve_fit<C: Catalog>(catalog: &C, fit: &Fit) -> Vec<Option<Item>> {
    let found = match catalog.get(&fit.item_ids).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, fit_id = %fit.id, "Could not resolve fit items");
            Vec::new()
        }
    };

    fit.item_ids
        .iter()
        .map(|id| found.iter().find(|item| &item.id == id).cloned())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fit_battler_core::{FitId, Price};

    use super::*;

    fn item(id: &str, title: &str, category: &str) -> Item {
        Item {
            id: ItemId::new(id),
            title: title.to_owned(),
            image_url: String::new(),
            price: Price::from_cents(2500),
            merchant: "Northfold".to_owned(),
            category: category.to_owned(),
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            item("i1", "Wool Overcoat", "outerwear"),
            item("i2", "Canvas Sneaker", "shoes"),
            item("i3", "Pleated Trouser", "bottoms"),
        ])
    }

    struct BrokenCatalog;

    impl Catalog for BrokenCatalog {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Item>, CatalogError> {
            Err(CatalogError::Unavailable("offline".to_owned()))
        }

        async fn popular(&self) -> Result<Vec<Item>, CatalogError> {
            Err(CatalogError::Unavailable("offline".to_owned()))
        }

        async fn get(&self, _ids: &[ItemId]) -> Result<Vec<Item>, CatalogError> {
            Err(CatalogError::Unavailable("offline".to_owned()))
        }
    }

    #[tokio::test]
    async fn test_slot_candidates_uses_search_hits() {
        let items = slot_candidates(&catalog(), "sneaker", 10).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().id, ItemId::new("i2"));
    }

    #[tokio::test]
    async fn test_slot_candidates_falls_back_to_popular() {
        let items = slot_candidates(&catalog(), "tuxedo", 2).await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_slot_candidates_failure_is_empty() {
        assert!(slot_candidates(&BrokenCatalog, "coat", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_fit_keeps_slot_order_and_gaps() {
        let fit = Fit {
            id: FitId::new_v4(),
            name: "A".to_owned(),
            item_ids: vec![ItemId::new("i3"), ItemId::new("gone"), ItemId::new("i1")],
        };
        let slots = resolve_fit(&catalog(), &fit).await;
        let ids: Vec<Option<&str>> = slots
            .iter()
            .map(|slot| slot.as_ref().map(|item| item.id.as_str()))
            .collect();
        assert_eq!(ids, vec![Some("i3"), None, Some("i1")]);
    }

    #[tokio::test]
    async fn test_resolve_fit_with_broken_catalog() {
        let fit = Fit {
            id: FitId::new_v4(),
            name: "B".to_owned(),
            item_ids: vec![ItemId::new("i1")],
        };
        assert_eq!(resolve_fit(&BrokenCatalog, &fit).await, vec![None]);
    }
}
