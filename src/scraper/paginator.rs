//! Listing pagination for one category
//!
//! Walks the category's listing pages in increasing offset order. After every
//! page the listing document is rewritten, so an interrupted or failed
//! traversal resumes from the first page that was not stored.
//!
//! Traversal stops when:
//! - A page comes back empty
//! - The entries received (repeats included) reach the total the source reported
//! - `max-pages` pages were fetched, whatever total the source reported

use crate::config::ListingConfig;
use crate::model::{Category, CategoryListing, ListingEntry};
use crate::scraper::parser::parse_listing_page;
use crate::scraper::scheduler::Scheduler;
use crate::source::Endpoints;
use crate::storage::DocumentStore;
use crate::Result;
use std::collections::HashSet;

/// Lazily pages through a category listing
pub struct Paginator<'a> {
    scheduler: &'a mut Scheduler,
    endpoints: &'a Endpoints,
    store: &'a DocumentStore,
    listing: CategoryListing,
    seen: HashSet<String>,
    max_pages: u32,
    save_raw: bool,
}

impl<'a> Paginator<'a> {
    /// Creates a paginator, resuming a stored partial listing when there is one
    pub fn new(
        scheduler: &'a mut Scheduler,
        endpoints: &'a Endpoints,
        store: &'a DocumentStore,
        category: &Category,
        config: &ListingConfig,
        save_raw: bool,
    ) -> Self {
        let listing = match store.load_listing(category.id) {
            Ok(Some(stored)) if stored.page_size == config.page_size => {
                if !stored.complete {
                    tracing::info!(
                        "Resuming category {} at offset {} ({} products so far)",
                        category.id,
                        stored.next_offset,
                        stored.entries.len()
                    );
                }
                stored
            }
            Ok(Some(_)) => {
                tracing::info!(
                    "Page size changed for category {}, listing it from the start",
                    category.id
                );
                CategoryListing::new(category, config.page_size, config.first_offset)
            }
            Ok(None) => CategoryListing::new(category, config.page_size, config.first_offset),
            Err(e) => {
                tracing::warn!(
                    "Stored listing for category {} is unreadable, starting over: {}",
                    category.id,
                    e
                );
                CategoryListing::new(category, config.page_size, config.first_offset)
            }
        };

        let seen = listing.product_ids().map(str::to_string).collect();

        Self {
            scheduler,
            endpoints,
            store,
            listing,
            seen,
            max_pages: config.max_pages,
            save_raw,
        }
    }

    /// Fetches the next page and returns the entries not seen before
    ///
    /// Returns `Ok(None)` once the listing is complete. A page that fails
    /// after retries ends the traversal with an error; the listing stored so
    /// far is kept for the next attempt.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ListingEntry>>> {
        if self.listing.complete {
            return Ok(None);
        }

        let category_id = self.listing.category_id;
        let offset = self.listing.next_offset;
        let request = self
            .endpoints
            .listing_page(category_id, offset, self.listing.page_size)?;

        let body = self.scheduler.execute(&request).await.into_result()?;

        if self.save_raw {
            let raw_id = format!("{}-{}", category_id, offset);
            if let Err(e) = self.store.save_raw("listing", &raw_id, &body) {
                tracing::warn!("Failed to save raw listing page {}: {}", raw_id, e);
            }
        }

        let page = parse_listing_page(&body, category_id)?;
        let received = page.entries.len() as u64;

        let listing = &mut self.listing;
        if listing.reported_total.is_none() {
            listing.reported_total = page.reported_total;
        }
        listing.pages_fetched += 1;
        listing.entries_received += received;
        listing.next_offset += u64::from(listing.page_size);

        let seen = &mut self.seen;
        let fresh: Vec<ListingEntry> = page
            .entries
            .into_iter()
            .filter(|e| seen.insert(e.product_id.clone()))
            .collect();
        listing.entries.extend(fresh.iter().cloned());

        tracing::debug!(
            "Category {} offset {}: {} entries, {} new, {} total",
            category_id,
            offset,
            received,
            fresh.len(),
            listing.entries.len()
        );

        match listing.reported_total {
            _ if received == 0 => listing.complete = true,
            Some(total) if listing.entries_received >= total => listing.complete = true,
            _ if listing.pages_fetched >= self.max_pages => {
                tracing::warn!(
                    "Category {} still incomplete after {} pages ({} of {:?} entries); stopping",
                    category_id,
                    listing.pages_fetched,
                    listing.entries_received,
                    listing.reported_total
                );
                listing.complete = true;
            }
            _ => {}
        }

        self.store.save_listing(&self.listing)?;
        Ok(Some(fresh))
    }

    /// Pages through the whole category and returns every unique entry
    pub async fn list_products(&mut self) -> Result<Vec<ListingEntry>> {
        while self.next_page().await?.is_some() {}

        tracing::info!(
            "Category {} listed: {} products in {} pages",
            self.listing.category_id,
            self.listing.entries.len(),
            self.listing.pages_fetched
        );
        Ok(self.listing.entries.clone())
    }

    pub fn listing(&self) -> &CategoryListing {
        &self.listing
    }

    pub fn into_listing(self) -> CategoryListing {
        self.listing
    }
}
