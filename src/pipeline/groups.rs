// src/pipeline/groups.rs

//! Group association bootstrap.

use std::future::Future;

use crate::error::Result;
use crate::models::GroupAssociations;
use crate::storage::TimetableStorage;

/// Return the cached association map, scraping and persisting it when absent.
///
/// With `force`, the cached file is ignored and replaced by a fresh scrape.
/// A failed scrape leaves any previous file untouched.
pub async fn load_or_scrape_associations<F, Fut>(
    storage: &dyn TimetableStorage,
    force: bool,
    scrape: F,
) -> Result<GroupAssociations>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<GroupAssociations>>,
{
    if !force {
        if let Some(associations) = storage.load_associations().await? {
            log::info!(
                "Loaded {} groups in {} categories from cache",
                associations.group_count(),
                associations.category_count()
            );
            return Ok(associations);
        }
    }

    log::info!("Fetching group ids for reference...");
    let associations = scrape().await?;
    storage.save_associations(&associations).await?;
    log::info!(
        "Saved {} groups in {} categories",
        associations.group_count(),
        associations.category_count()
    );
    Ok(associations)
}
