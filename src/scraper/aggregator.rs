//! Product detail aggregation
//!
//! Builds a `ProductRecord` from five independent sub-resource calls:
//! initial detail, offers, reviews overview, price history (one call per
//! configured interval) and similar products. A failing section is recorded on
//! the record and does not stop the others.

use crate::model::{ListingEntry, ProductRecord, Section};
use crate::scraper::parser::{
    parse_detail, parse_offers, parse_price_history, parse_reviews, parse_similar,
};
use crate::scraper::scheduler::Scheduler;
use crate::source::{Endpoints, SourceRequest};
use crate::storage::DocumentStore;
use crate::{Result, SourceError};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fetches and merges the sections of one product
pub struct ProductAggregator<'a> {
    endpoints: &'a Endpoints,
    store: &'a DocumentStore,
    intervals: &'a [String],
    save_raw: bool,
}

impl<'a> ProductAggregator<'a> {
    pub fn new(
        endpoints: &'a Endpoints,
        store: &'a DocumentStore,
        intervals: &'a [String],
        save_raw: bool,
    ) -> Self {
        Self {
            endpoints,
            store,
            intervals,
            save_raw,
        }
    }

    /// Builds the record for one listed product
    ///
    /// When `previous` holds an earlier partial record for the same product,
    /// its fetched sections are kept and only the missing ones are requested.
    /// If the detail call reports the product gone, every other section is
    /// skipped.
    ///
    /// Only request construction errors are returned; source failures end up
    /// on the sections.
    pub async fn fetch_product(
        &self,
        scheduler: &mut Scheduler,
        entry: &ListingEntry,
        previous: Option<ProductRecord>,
    ) -> Result<ProductRecord> {
        let product_id = entry.product_id.as_str();
        let category_id = entry.category_id;
        let previous = previous.filter(|p| p.product_id == entry.product_id);

        if let Some(p) = &previous {
            tracing::debug!(
                "Product {} has a partial record, refetching: {:?}",
                product_id,
                p.missing_sections()
            );
        }

        let (detail, gone) = match reuse(previous.as_ref().map(|p| &p.detail)) {
            Some(section) => (section, false),
            None => {
                let request = self.endpoints.detail(category_id, product_id)?;
                let result = self
                    .fetch_section(scheduler, "detail", product_id, request, parse_detail)
                    .await;
                let gone = matches!(&result, Err(e) if e.is_not_found());
                (Section::from_result(result), gone)
            }
        };

        if gone {
            tracing::warn!("Product {} is gone from the source, skipping its sections", product_id);
            return Ok(ProductRecord {
                product_id: product_id.to_string(),
                category_id,
                listing_name: entry.name.clone(),
                scraped_at: Utc::now(),
                detail,
                offers: Section::Skipped,
                reviews: Section::Skipped,
                price_history: self
                    .intervals
                    .iter()
                    .map(|i| (i.clone(), Section::Skipped))
                    .collect(),
                similar: Section::Skipped,
            });
        }

        let offers = match reuse(previous.as_ref().map(|p| &p.offers)) {
            Some(section) => section,
            None => {
                let request = self.endpoints.offers(product_id)?;
                Section::from_result(
                    self.fetch_section(scheduler, "offers", product_id, request, parse_offers)
                        .await,
                )
            }
        };

        let reviews = match reuse(previous.as_ref().map(|p| &p.reviews)) {
            Some(section) => section,
            None => {
                let request = self.endpoints.reviews(product_id)?;
                Section::from_result(
                    self.fetch_section(scheduler, "reviews", product_id, request, parse_reviews)
                        .await,
                )
            }
        };

        let mut price_history = BTreeMap::new();
        for interval in self.intervals {
            let reused = reuse(previous.as_ref().and_then(|p| p.price_history.get(interval)));

            let section = match reused {
                Some(section) => section,
                None => {
                    let request = self.endpoints.price_history(product_id, interval)?;
                    let raw_section = format!("price_history_{}", interval);
                    Section::from_result(
                        self.fetch_section(scheduler, &raw_section, product_id, request, |body| {
                            parse_price_history(body, interval)
                        })
                        .await,
                    )
                }
            };
            price_history.insert(interval.clone(), section);
        }

        let similar = match reuse(previous.as_ref().map(|p| &p.similar)) {
            Some(section) => section,
            None => {
                let request = self.endpoints.similar(category_id, product_id)?;
                Section::from_result(
                    self.fetch_section(scheduler, "similar", product_id, request, parse_similar)
                        .await,
                )
            }
        };

        let record = ProductRecord {
            product_id: product_id.to_string(),
            category_id,
            listing_name: entry.name.clone(),
            scraped_at: Utc::now(),
            detail,
            offers,
            reviews,
            price_history,
            similar,
        };

        if !record.is_complete() {
            tracing::debug!(
                "Product {} is partial, missing {:?}",
                product_id,
                record.missing_sections()
            );
        }

        Ok(record)
    }

    async fn fetch_section<T>(
        &self,
        scheduler: &mut Scheduler,
        section: &str,
        product_id: &str,
        request: SourceRequest,
        parse: impl Fn(&Value) -> std::result::Result<T, SourceError>,
    ) -> std::result::Result<T, SourceError> {
        let result = scheduler.execute(&request).await.into_result();

        let parsed = result.and_then(|body| {
            if self.save_raw {
                if let Err(e) = self.store.save_raw(section, product_id, &body) {
                    tracing::warn!("Failed to save raw {} for {}: {}", section, product_id, e);
                }
            }
            parse(&body)
        });

        if let Err(e) = &parsed {
            tracing::debug!("Section {} of product {} failed: {}", section, product_id, e);
        }
        parsed
    }
}

/// A section from an earlier record, kept only if it was fetched
fn reuse<T: Clone>(section: Option<&Section<T>>) -> Option<Section<T>> {
    section.filter(|s| s.is_fetched()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SchedulerConfig};
    use crate::source::{SourceResponse, Transport, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Answers by path fragment; unmatched paths get a 503
    struct RoutedSource {
        routes: Vec<(&'static str, u16, Value)>,
        paths: Mutex<Vec<String>>,
    }

    impl RoutedSource {
        fn new(routes: Vec<(&'static str, u16, Value)>) -> Arc<Self> {
            Arc::new(Self {
                routes,
                paths: Mutex::new(Vec::new()),
            })
        }

        fn calls_to(&self, fragment: &str) -> usize {
            self.paths
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.contains(fragment))
                .count()
        }

        fn total_calls(&self) -> usize {
            self.paths.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for RoutedSource {
        async fn call(
            &self,
            request: &SourceRequest,
        ) -> std::result::Result<SourceResponse, TransportError> {
            let path = request.url.path().to_string();
            self.paths.lock().unwrap().push(path.clone());
            for (fragment, status, body) in &self.routes {
                if path.contains(fragment) {
                    return Ok(SourceResponse::new(*status, body.clone()));
                }
            }
            Ok(SourceResponse::new(503, Value::Null))
        }
    }

    fn healthy_routes() -> Vec<(&'static str, u16, Value)> {
        vec![
            ("/initial/", 200, json!({"product": {"name": "Widget"}})),
            (
                "/offers/",
                200,
                json!({"offers": [{"price": {"amount": 9.5, "currency": "GBP"}, "merchant": {"name": "Shop"}}]}),
            ),
            ("/reviews/", 200, json!({"averageRating": 4.0, "totalReviews": 2, "userReviews": [{}, {}]})),
            ("/pricehistory/", 200, json!({"pricePoints": [{"price": 10.0}, {"price": 8.0}]})),
            ("/similar/", 200, json!({"products": [{"id": 2}]})),
        ]
    }

    fn scheduler(source: Arc<RoutedSource>) -> Scheduler {
        Scheduler::new(
            SchedulerConfig {
                min_delay_ms: 0,
                max_delay_ms: 0,
                max_attempts: 1,
                backoff_base_ms: 1,
                max_backoff_ms: 1,
                rate_limit_multiplier: 1,
            },
            source,
        )
    }

    fn entry() -> ListingEntry {
        ListingEntry {
            category_id: 10,
            product_id: "42".to_string(),
            name: Some("Listed Widget".to_string()),
        }
    }

    #[tokio::test]
    async fn test_complete_record() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path()).unwrap();
        let config = Config::default();
        let endpoints = Endpoints::new(&config);
        let intervals = vec!["THREE_MONTHS".to_string(), "ONE_YEAR".to_string()];
        let source = RoutedSource::new(healthy_routes());
        let mut scheduler = scheduler(source.clone());

        let aggregator = ProductAggregator::new(&endpoints, &store, &intervals, false);
        let record = aggregator
            .fetch_product(&mut scheduler, &entry(), None)
            .await
            .unwrap();

        assert!(record.is_complete());
        assert_eq!(record.name(), Some("Widget"));
        assert_eq!(record.offers.data().unwrap().lowest_price, Some(9.5));
        assert_eq!(record.price_history.len(), 2);
        let stats = record.price_history["ONE_YEAR"].data().unwrap().stats.clone().unwrap();
        assert_eq!(stats.min, 8.0);
        assert_eq!(source.total_calls(), 6);
    }

    #[tokio::test]
    async fn test_failed_section_is_isolated() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path()).unwrap();
        let endpoints = Endpoints::new(&Config::default());
        let intervals = vec!["THREE_MONTHS".to_string()];
        let routes = healthy_routes()
            .into_iter()
            .filter(|(fragment, _, _)| *fragment != "/offers/")
            .collect();
        let source = RoutedSource::new(routes);
        let mut scheduler = scheduler(source.clone());

        let record = ProductAggregator::new(&endpoints, &store, &intervals, false)
            .fetch_product(&mut scheduler, &entry(), None)
            .await
            .unwrap();

        assert!(record.is_viable());
        assert!(!record.is_complete());
        assert!(matches!(record.offers, Section::Failed { retryable: true, .. }));
        assert!(record.reviews.is_fetched());
        assert!(record.similar.is_fetched());
    }

    #[tokio::test]
    async fn test_not_found_skips_remaining_sections() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path()).unwrap();
        let endpoints = Endpoints::new(&Config::default());
        let intervals = vec!["THREE_MONTHS".to_string()];
        let source = RoutedSource::new(vec![("/initial/", 404, Value::Null)]);
        let mut scheduler = scheduler(source.clone());

        let record = ProductAggregator::new(&endpoints, &store, &intervals, false)
            .fetch_product(&mut scheduler, &entry(), None)
            .await
            .unwrap();

        assert!(!record.is_viable());
        assert_eq!(record.offers, Section::Skipped);
        assert_eq!(record.price_history["THREE_MONTHS"], Section::Skipped);
        assert_eq!(record.name(), Some("Listed Widget"));
        assert_eq!(source.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_reuses_fetched_sections() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path()).unwrap();
        let endpoints = Endpoints::new(&Config::default());
        let intervals = vec!["THREE_MONTHS".to_string()];

        let partial_routes = healthy_routes()
            .into_iter()
            .filter(|(fragment, _, _)| *fragment != "/reviews/")
            .collect();
        let first = RoutedSource::new(partial_routes);
        let aggregator = ProductAggregator::new(&endpoints, &store, &intervals, false);
        let partial = aggregator
            .fetch_product(&mut scheduler(first.clone()), &entry(), None)
            .await
            .unwrap();
        assert!(!partial.reviews.is_fetched());

        let second = RoutedSource::new(healthy_routes());
        let record = aggregator
            .fetch_product(&mut scheduler(second.clone()), &entry(), Some(partial))
            .await
            .unwrap();

        assert!(record.is_complete());
        assert_eq!(second.total_calls(), 1);
        assert_eq!(second.calls_to("/reviews/"), 1);
    }

    #[tokio::test]
    async fn test_raw_bodies_are_saved_when_enabled() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path()).unwrap();
        let endpoints = Endpoints::new(&Config::default());
        let intervals = vec!["SIX_MONTHS".to_string()];
        let source = RoutedSource::new(healthy_routes());

        ProductAggregator::new(&endpoints, &store, &intervals, true)
            .fetch_product(&mut scheduler(source), &entry(), None)
            .await
            .unwrap();

        assert!(dir.path().join("raw/detail/42.json").exists());
        assert!(dir.path().join("raw/price_history_SIX_MONTHS/42.json").exists());
    }
}
