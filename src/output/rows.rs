//! Flat tabular projection of product records
//!
//! One row per viable product. Sections that were not fetched map to empty
//! cells.

use crate::model::{PriceHistory, ProductRecord, Section};
use serde::Serialize;

/// A product record flattened for CSV export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub product_id: String,
    pub category_id: u64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub lowest_price: Option<f64>,
    pub currency: Option<String>,
    pub merchant: Option<String>,
    pub total_offers: Option<usize>,
    pub average_rating: Option<f64>,
    pub total_reviews: Option<u64>,
    pub user_review_count: Option<usize>,
    pub pro_review_count: Option<usize>,
    pub history_interval: Option<String>,
    pub history_min: Option<f64>,
    pub history_max: Option<f64>,
    pub history_avg: Option<f64>,
    pub similar_count: Option<usize>,
    pub detail_fetched: bool,
    pub offers_fetched: bool,
    pub reviews_fetched: bool,
    pub price_history_fetched: bool,
    pub similar_fetched: bool,
}

impl ProductRow {
    /// Column names, in field order
    pub const HEADERS: [&'static str; 22] = [
        "product_id",
        "category_id",
        "name",
        "description",
        "lowest_price",
        "currency",
        "merchant",
        "total_offers",
        "average_rating",
        "total_reviews",
        "user_review_count",
        "pro_review_count",
        "history_interval",
        "history_min",
        "history_max",
        "history_avg",
        "similar_count",
        "detail_fetched",
        "offers_fetched",
        "reviews_fetched",
        "price_history_fetched",
        "similar_fetched",
    ];

    /// Projects a record into a row
    ///
    /// The history columns summarize `primary_interval` when the record has
    /// it fetched, otherwise the first fetched interval.
    pub fn from_record(record: &ProductRecord, primary_interval: Option<&str>) -> Self {
        let detail = record.detail.data();
        let offers = record.offers.data();
        let reviews = record.reviews.data();
        let history = primary_history(record, primary_interval);
        let stats = history.and_then(|h| h.stats.as_ref());

        Self {
            product_id: record.product_id.clone(),
            category_id: record.category_id,
            name: record.name().map(str::to_string),
            description: detail.and_then(|d| d.description.clone()),
            lowest_price: offers.and_then(|o| o.lowest_price),
            currency: offers.and_then(|o| o.currency.clone()),
            merchant: offers.and_then(|o| o.merchant.clone()),
            total_offers: offers.map(|o| o.total_offers),
            average_rating: reviews.and_then(|r| r.average_rating),
            total_reviews: reviews.map(|r| r.total_reviews),
            user_review_count: reviews.map(|r| r.user_review_count),
            pro_review_count: reviews.map(|r| r.pro_review_count),
            history_interval: history.map(|h| h.interval.clone()),
            history_min: stats.map(|s| s.min),
            history_max: stats.map(|s| s.max),
            history_avg: stats.map(|s| s.avg),
            similar_count: record.similar.data().map(|s| s.product_ids.len()),
            detail_fetched: record.detail.is_fetched(),
            offers_fetched: record.offers.is_fetched(),
            reviews_fetched: record.reviews.is_fetched(),
            price_history_fetched: !record.price_history.is_empty()
                && record.price_history.values().all(Section::is_fetched),
            similar_fetched: record.similar.is_fetched(),
        }
    }
}

fn primary_history<'r>(
    record: &'r ProductRecord,
    primary_interval: Option<&str>,
) -> Option<&'r PriceHistory> {
    primary_interval
        .and_then(|i| record.price_history.get(i))
        .and_then(Section::data)
        .or_else(|| record.price_history.values().find_map(Section::data))
}
