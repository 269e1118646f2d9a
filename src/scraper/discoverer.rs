//! Category discovery
//!
//! Fetches the category index, flattens it to leaf categories, persists it,
//! and applies the configured category filter. A persisted index is reused
//! on later runs unless rediscovery is requested.

use crate::config::CategoriesConfig;
use crate::model::Category;
use crate::scraper::parser::parse_categories;
use crate::scraper::scheduler::{Outcome, Scheduler};
use crate::source::Endpoints;
use crate::storage::DocumentStore;
use crate::{HarvestError, Result};

/// Discovers the categories a run works on
pub struct CategoryDiscoverer<'a> {
    endpoints: &'a Endpoints,
    store: &'a DocumentStore,
    save_raw: bool,
}

impl<'a> CategoryDiscoverer<'a> {
    pub fn new(endpoints: &'a Endpoints, store: &'a DocumentStore, save_raw: bool) -> Self {
        Self {
            endpoints,
            store,
            save_raw,
        }
    }

    /// Returns the selected leaf categories
    ///
    /// # Errors
    ///
    /// * `HarvestError::Discovery` - The index could not be fetched after
    ///   retries, or the body held no recognizable category data
    /// * `HarvestError::Storage` - The index could not be persisted
    pub async fn discover(
        &self,
        scheduler: &mut Scheduler,
        selection: &CategoriesConfig,
    ) -> Result<Vec<Category>> {
        let index = match self.persisted_index(selection.rediscover) {
            Some(index) => index,
            None => self.fetch_index(scheduler).await?,
        };

        Ok(select_categories(index, &selection.ids))
    }

    fn persisted_index(&self, rediscover: bool) -> Option<Vec<Category>> {
        if rediscover {
            tracing::info!("Rediscovery requested, refreshing the category index");
            return None;
        }

        match self.store.load_categories() {
            Ok(Some(index)) if !index.is_empty() => {
                tracing::info!("Using persisted category index ({} categories)", index.len());
                Some(index)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Persisted category index is unreadable, refetching: {}", e);
                None
            }
        }
    }

    async fn fetch_index(&self, scheduler: &mut Scheduler) -> Result<Vec<Category>> {
        tracing::info!("Fetching category index");
        let request = self.endpoints.categories()?;

        let body = match scheduler.execute(&request).await {
            Outcome::Success(body) => body,
            Outcome::Exhausted {
                attempts,
                last_error,
            } => {
                return Err(HarvestError::Discovery(format!(
                    "category index unreachable after {} attempt(s): {}",
                    attempts, last_error
                )))
            }
        };

        if self.save_raw {
            if let Err(e) = self.store.save_raw("categories", "index", &body) {
                tracing::warn!("Failed to save raw category index: {}", e);
            }
        }

        let categories =
            parse_categories(&body).map_err(|e| HarvestError::Discovery(e.to_string()))?;
        self.store.save_categories(&categories)?;

        tracing::info!("Discovered {} categories", categories.len());
        Ok(categories)
    }
}

/// Applies a category filter to the index
///
/// An empty filter selects everything. Otherwise a category is kept when its
/// id or any ancestor id is in the filter. Filter ids matching nothing in the
/// index are appended as placeholder categories so they are still scraped.
pub fn select_categories(index: Vec<Category>, filter: &[u64]) -> Vec<Category> {
    if filter.is_empty() {
        return index;
    }

    let mut selected: Vec<Category> = index
        .iter()
        .filter(|c| c.is_within(filter))
        .cloned()
        .collect();

    for &id in filter {
        let known = index
            .iter()
            .any(|c| c.id == id || c.ancestors.contains(&id));
        if !known && !selected.iter().any(|c| c.id == id) {
            tracing::warn!("Category {} is not in the index, scraping it as requested", id);
            selected.push(Category::synthetic(id));
        }
    }

    selected
}
