//! Summary statistics over consolidated product records
//!
//! Everything here is derived from persisted documents only, and nothing
//! reads the clock, so the same inputs always produce the same summary.

use crate::model::{Category, CategoryListing, ProductRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Lower bounds of the price distribution buckets; the last one is open-ended
const PRICE_BUCKET_BOUNDS: [f64; 7] = [0.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

/// Summary written to `consolidated/summary_stats.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    /// Exported (viable) products
    pub total_products: usize,

    /// Exported products with every section fetched
    pub complete_products: usize,

    /// Exported products missing at least one section
    pub partial_products: usize,

    /// Records left out of the exports because their detail is missing
    pub excluded_products: usize,

    /// Product files that could not be parsed
    pub unreadable_files: usize,

    pub total_categories: usize,

    /// Unique product ids across every listing
    pub total_listed_products: usize,

    pub categories: Vec<CategoryCount>,
    pub price_distribution: PriceDistribution,
    pub review_coverage: ReviewCoverage,
}

/// Listed versus scraped products for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category_id: u64,
    pub name: String,
    pub listed: usize,
    pub scraped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDistribution {
    /// Products with a usable lowest offer price
    pub count: usize,
    /// Negative or non-finite prices left out of every figure below
    pub invalid: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub buckets: Vec<PriceBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBucket {
    /// Inclusive lower bound
    pub from: f64,
    /// Exclusive upper bound; None for the last bucket
    pub to: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewCoverage {
    /// Exported products whose reviews section was fetched
    pub with_reviews: usize,
    pub rate: f64,
}

/// Computes summary statistics
///
/// # Arguments
///
/// * `exported` - The viable records that go into the exports
/// * `excluded` - Count of records left out for missing detail
/// * `unreadable` - Count of product files that could not be parsed
/// * `listings` - Every stored category listing
/// * `index` - The category index, used for names of categories without a listing
pub fn compute_summary(
    exported: &[&ProductRecord],
    excluded: usize,
    unreadable: usize,
    listings: &[CategoryListing],
    index: &[Category],
) -> SummaryStatistics {
    let complete_products = exported.iter().filter(|r| r.is_complete()).count();

    let listed_ids: HashSet<&str> = listings.iter().flat_map(|l| l.product_ids()).collect();

    let with_reviews = exported.iter().filter(|r| r.reviews.is_fetched()).count();
    let rate = if exported.is_empty() {
        0.0
    } else {
        with_reviews as f64 / exported.len() as f64
    };

    let prices: Vec<f64> = exported
        .iter()
        .filter_map(|r| r.offers.data().and_then(|o| o.lowest_price))
        .collect();

    SummaryStatistics {
        total_products: exported.len(),
        complete_products,
        partial_products: exported.len() - complete_products,
        excluded_products: excluded,
        unreadable_files: unreadable,
        total_categories: listings.len(),
        total_listed_products: listed_ids.len(),
        categories: category_counts(exported, listings, index),
        price_distribution: price_distribution(&prices),
        review_coverage: ReviewCoverage { with_reviews, rate },
    }
}

fn category_counts(
    exported: &[&ProductRecord],
    listings: &[CategoryListing],
    index: &[Category],
) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<u64, CategoryCount> = BTreeMap::new();

    for listing in listings {
        counts.insert(
            listing.category_id,
            CategoryCount {
                category_id: listing.category_id,
                name: listing.category_name.clone(),
                listed: listing.entries.len(),
                scraped: 0,
            },
        );
    }

    for record in exported {
        counts
            .entry(record.category_id)
            .or_insert_with(|| {
                let name = index
                    .iter()
                    .find(|c| c.id == record.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| Category::synthetic(record.category_id).name);
                CategoryCount {
                    category_id: record.category_id,
                    name,
                    listed: 0,
                    scraped: 0,
                }
            })
            .scraped += 1;
    }

    counts.into_values().collect()
}

/// Distribution of lowest offer prices
///
/// Only finite, non-negative prices are counted; the rest are tallied in
/// `invalid`.
pub fn price_distribution(prices: &[f64]) -> PriceDistribution {
    let mut buckets: Vec<PriceBucket> = PRICE_BUCKET_BOUNDS
        .iter()
        .enumerate()
        .map(|(i, &from)| PriceBucket {
            from,
            to: PRICE_BUCKET_BOUNDS.get(i + 1).copied(),
            count: 0,
        })
        .collect();

    let mut sorted: Vec<f64> = prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p >= 0.0)
        .collect();
    let invalid = prices.len() - sorted.len();
    if invalid > 0 {
        tracing::warn!("Ignoring {} negative or non-finite prices", invalid);
    }

    if sorted.is_empty() {
        return PriceDistribution {
            count: 0,
            invalid,
            min: None,
            max: None,
            mean: None,
            median: None,
            buckets,
        };
    }

    sorted.sort_by(|a, b| a.total_cmp(b));

    for &price in &sorted {
        if let Some(slot) = buckets.iter().rposition(|b| price >= b.from) {
            buckets[slot].count += 1;
        }
    }

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    PriceDistribution {
        count: n,
        invalid,
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        mean: Some(sorted.iter().sum::<f64>() / n as f64),
        median: Some(median),
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListingEntry, ProductDetail, ReviewSummary, Section};
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn record(id: &str, category_id: u64, reviews: bool) -> ProductRecord {
        ProductRecord {
            product_id: id.to_string(),
            category_id,
            listing_name: None,
            scraped_at: Utc::now(),
            detail: Section::Fetched(ProductDetail {
                name: format!("Product {}", id),
                description: None,
                brand: None,
                category_name: None,
                image_url: None,
            }),
            offers: Section::Skipped,
            reviews: if reviews {
                Section::Fetched(ReviewSummary::new(None, Some(0), vec![]))
            } else {
                Section::Skipped
            },
            price_history: Map::new(),
            similar: Section::Skipped,
        }
    }

    #[test]
    fn test_price_distribution() {
        let dist = price_distribution(&[120.0, 10.0, 30.0, 2000.0]);

        assert_eq!(dist.count, 4);
        assert_eq!(dist.min, Some(10.0));
        assert_eq!(dist.max, Some(2000.0));
        assert_eq!(dist.median, Some(75.0));
        assert_eq!(dist.mean, Some(540.0));

        let counts: Vec<_> = dist.buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 1, 0, 0, 1]);
        assert_eq!(dist.buckets.last().unwrap().to, None);
    }

    #[test]
    fn test_negative_prices_are_not_bucketed() {
        let dist = price_distribution(&[-5.0, 10.0, f64::NAN]);

        assert_eq!(dist.count, 1);
        assert_eq!(dist.invalid, 2);
        assert_eq!(dist.min, Some(10.0));
        assert_eq!(dist.mean, Some(10.0));
        assert_eq!(dist.buckets[0].count, 1);
        assert_eq!(dist.buckets.iter().map(|b| b.count).sum::<usize>(), 1);

        let only_negative = price_distribution(&[-1.0]);
        assert_eq!(only_negative.count, 0);
        assert_eq!(only_negative.invalid, 1);
        assert!(only_negative.min.is_none());
        assert!(only_negative.buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_empty_price_distribution() {
        let dist = price_distribution(&[]);
        assert_eq!(dist.count, 0);
        assert!(dist.median.is_none());
        assert_eq!(dist.buckets.len(), PRICE_BUCKET_BOUNDS.len());
    }

    #[test]
    fn test_summary_counts() {
        let a = record("1", 10, true);
        let b = record("2", 10, false);
        let c = record("3", 20, true);
        let exported = vec![&a, &b, &c];

        let mut listing = CategoryListing::new(&Category::synthetic(10), 50, 1);
        listing.category_name = "Kettles".to_string();
        for id in ["1", "2", "9"] {
            listing.entries.push(ListingEntry {
                category_id: 10,
                product_id: id.to_string(),
                name: None,
            });
        }
        let index = vec![Category {
            name: "Toasters".to_string(),
            ..Category::synthetic(20)
        }];

        let summary = compute_summary(&exported, 1, 2, &[listing], &index);

        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.complete_products, 0);
        assert_eq!(summary.partial_products, 3);
        assert_eq!(summary.excluded_products, 1);
        assert_eq!(summary.unreadable_files, 2);
        assert_eq!(summary.total_categories, 1);
        assert_eq!(summary.total_listed_products, 3);
        assert_eq!(summary.review_coverage.with_reviews, 2);
        assert!((summary.review_coverage.rate - 2.0 / 3.0).abs() < 1e-9);

        assert_eq!(
            summary.categories,
            vec![
                CategoryCount {
                    category_id: 10,
                    name: "Kettles".to_string(),
                    listed: 3,
                    scraped: 2,
                },
                CategoryCount {
                    category_id: 20,
                    name: "Toasters".to_string(),
                    listed: 0,
                    scraped: 1,
                },
            ]
        );
    }
}
