//! Seed catalog held in memory.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use fit_battler_core::{Item, ItemId};

use super::{Catalog, CatalogError};

const DEFAULT_POPULAR: usize = 24;

/// A fixed list of items, typically loaded from `catalog.json`.
///
/// `popular()` returns the first items in file order.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    items: Arc<[Item]>,
    popular_count: usize,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: items.into(),
            popular_count: DEFAULT_POPULAR,
        }
    }

    /// Change how many items `popular()` returns.
    #[must_use]
    pub const fn with_popular_count(mut self, count: usize) -> Self {
        self.popular_count = count;
        self
    }

    /// Load a catalog file. `.yaml` / `.yml` files are read as YAML, anything
    /// else as JSON. A missing file yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    #[instrument(fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No catalog file, starting with an empty catalog");
                return Ok(Self::new(Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let items: Vec<Item> = if is_yaml {
            serde_yaml::from_str(&raw)?
        } else {
            serde_json::from_str(&raw)?
        };

        info!(items = items.len(), "Loaded catalog");
        Ok(Self::new(items))
    }

    /// Every item in file order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn search_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

impl Catalog for StaticCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Item>, CatalogError> {
        let terms = search_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .items
            .iter()
            .filter(|item| item.matches_any(&terms))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn popular(&self) -> Result<Vec<Item>, CatalogError> {
        Ok(self.items.iter().take(self.popular_count).cloned().collect())
    }

    async fn get(&self, ids: &[ItemId]) -> Result<Vec<Item>, CatalogError> {
        Ok(self
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }
}
