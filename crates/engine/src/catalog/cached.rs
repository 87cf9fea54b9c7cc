//! Caching decorator for catalog providers.
//!
//! Search and popular results are cached for 5 minutes using `moka`.
//! Lookups by id are cached per item.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use fit_battler_core::{Item, ItemId};

use super::{Catalog, CatalogError};

/// Cache key for catalog responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Search { query: String, limit: usize },
    Popular,
    Item(ItemId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Items(Arc<Vec<Item>>),
    Item(Box<Item>),
}

/// Wraps a [`Catalog`] with an in-memory TTL cache.
///
/// Cheaply cloneable; clones share the cache.
pub struct CachedCatalog<C> {
    inner: Arc<CachedCatalogInner<C>>,
}

impl<C> Clone for CachedCatalog<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CachedCatalogInner<C> {
    catalog: C,
    cache: Cache<CacheKey, CacheValue>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap `catalog` with the default cache (1000 entries, 5 minutes).
    #[must_use]
    pub fn new(catalog: C) -> Self {
        Self::with_ttl(catalog, Duration::from_secs(300))
    }

    #[must_use]
    pub fn with_ttl(catalog: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self {
            inner: Arc::new(CachedCatalogInner { catalog, cache }),
        }
    }

    /// The wrapped provider.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner.catalog
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Item>, CatalogError> {
        let key = CacheKey::Search {
            query: query.trim().to_lowercase(),
            limit,
        };
        if let Some(CacheValue::Items(items)) = self.inner.cache.get(&key).await {
            debug!(query, "Cache hit for search");
            return Ok(items.as_ref().clone());
        }

        let items = self.inner.catalog.search(query, limit).await?;
        // Empty results are not cached so the popular fallback sees fresh data
        if !items.is_empty() {
            self.inner
                .cache
                .insert(key, CacheValue::Items(Arc::new(items.clone())))
                .await;
        }
        Ok(items)
    }

    async fn popular(&self) -> Result<Vec<Item>, CatalogError> {
        if let Some(CacheValue::Items(items)) = self.inner.cache.get(&CacheKey::Popular).await {
            debug!("Cache hit for popular");
            return Ok(items.as_ref().clone());
        }

        let items = self.inner.catalog.popular().await?;
        self.inner
            .cache
            .insert(CacheKey::Popular, CacheValue::Items(Arc::new(items.clone())))
            .await;
        Ok(items)
    }

    async fn get(&self, ids: &[ItemId]) -> Result<Vec<Item>, CatalogError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.inner.cache.get(&CacheKey::Item(id.clone())).await {
                Some(CacheValue::Item(item)) => found.push(*item),
                _ => missing.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            for item in self.inner.catalog.get(&missing).await? {
                self.inner
                    .cache
                    .insert(
                        CacheKey::Item(item.id.clone()),
                        CacheValue::Item(Box::new(item.clone())),
                    )
                    .await;
                found.push(item);
            }
        }
        Ok(found)
    }
}
