//! Catalog commands.

use fit_battler_engine::BattlerConfig;
use fit_battler_engine::catalog::{CachedCatalog, StaticCatalog, slot_candidates};

use crate::output::print_json;

/// Search the catalog the way the item picker does: matching items, or
/// popular items when nothing matches.
///
/// # Errors
///
/// Returns an error if the catalog file cannot be read or parsed.
pub async fn search(
    config: &BattlerConfig,
    query: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = CachedCatalog::new(StaticCatalog::load(&config.catalog_path).await?);
    let items = slot_candidates(&catalog, query, limit).await;
    print_json(&items)?;
    Ok(())
}
