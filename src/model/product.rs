use crate::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one sub-resource fetch, stored on the record
///
/// This is the per-section success flag: consolidation and section-level
/// retries read it instead of guessing from absent fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Section<T> {
    Fetched(T),
    Failed { error: String, retryable: bool },
    /// Not attempted because the product is gone from the source
    Skipped,
}

impl<T> Section<T> {
    pub fn from_result(result: Result<T, SourceError>) -> Self {
        match result {
            Ok(value) => Self::Fetched(value),
            Err(e) => Self::Failed {
                retryable: e.is_retryable(),
                error: e.to_string(),
            },
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Fetched(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Names of the five sub-resources composing a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Detail,
    Offers,
    Reviews,
    PriceHistory,
    Similar,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Offers => "offers",
            Self::Reviews => "reviews",
            Self::PriceHistory => "price_history",
            Self::Similar => "similar",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic product information from the initial-detail call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
}

/// One merchant offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub merchant: Option<String>,
    pub price: f64,
    pub currency: Option<String>,
    pub url: Option<String>,
    pub in_stock: Option<bool>,
}

/// Offers with the cheapest one picked out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSummary {
    pub lowest_price: Option<f64>,
    pub currency: Option<String>,
    pub merchant: Option<String>,
    pub total_offers: usize,
    pub offers: Vec<Offer>,
}

impl OfferSummary {
    /// Derives the lowest offer from the full list; the first offer wins ties
    pub fn from_offers(offers: Vec<Offer>) -> Self {
        let lowest = offers
            .iter()
            .fold(None::<&Offer>, |best, offer| match best {
                Some(b) if b.price <= offer.price => Some(b),
                _ => Some(offer),
            });

        Self {
            lowest_price: lowest.map(|o| o.price),
            currency: lowest.and_then(|o| o.currency.clone()),
            merchant: lowest.and_then(|o| o.merchant.clone()),
            total_offers: offers.len(),
            offers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    User,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub kind: ReviewKind,
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub average_rating: Option<f64>,
    pub total_reviews: u64,
    pub user_review_count: usize,
    pub pro_review_count: usize,
    pub reviews: Vec<Review>,
}

impl ReviewSummary {
    pub fn new(average_rating: Option<f64>, total_reviews: Option<u64>, reviews: Vec<Review>) -> Self {
        let user_review_count = reviews.iter().filter(|r| r.kind == ReviewKind::User).count();
        let pro_review_count = reviews.len() - user_review_count;

        Self {
            average_rating,
            total_reviews: total_reviews.unwrap_or(reviews.len() as u64),
            user_review_count,
            pro_review_count,
            reviews,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: Option<String>,
    pub price: f64,
}

/// Statistics computed from a raw price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub points: usize,
}

impl PriceStats {
    /// Returns None for an empty series
    pub fn from_points(points: &[PricePoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for point in points {
            min = min.min(point.price);
            max = max.max(point.price);
            sum += point.price;
        }

        Some(Self {
            min,
            max,
            avg: sum / points.len() as f64,
            points: points.len(),
        })
    }
}

/// Price series for one configured interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub interval: String,
    pub points: Vec<PricePoint>,
    pub stats: Option<PriceStats>,
}

impl PriceHistory {
    pub fn new(interval: &str, points: Vec<PricePoint>) -> Self {
        let stats = PriceStats::from_points(&points);
        Self {
            interval: interval.to_string(),
            points,
            stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProducts {
    pub product_ids: Vec<String>,
}

/// The aggregate unit of work: everything known about one product
///
/// Stored as `products/product_<id>.json`; a record may be partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub category_id: u64,
    pub listing_name: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub detail: Section<ProductDetail>,
    pub offers: Section<OfferSummary>,
    pub reviews: Section<ReviewSummary>,
    /// Keyed by interval name
    pub price_history: BTreeMap<String, Section<PriceHistory>>,
    pub similar: Section<SimilarProducts>,
}

impl ProductRecord {
    /// The minimum viable record: initial detail was fetched
    pub fn is_viable(&self) -> bool {
        self.detail.is_fetched()
    }

    /// Every section, and every price history interval, was fetched
    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }

    /// Sections that have not been fetched
    pub fn missing_sections(&self) -> Vec<SectionKind> {
        let mut missing = Vec::new();
        if !self.detail.is_fetched() {
            missing.push(SectionKind::Detail);
        }
        if !self.offers.is_fetched() {
            missing.push(SectionKind::Offers);
        }
        if !self.reviews.is_fetched() {
            missing.push(SectionKind::Reviews);
        }
        if self.price_history.is_empty() || self.price_history.values().any(|s| !s.is_fetched()) {
            missing.push(SectionKind::PriceHistory);
        }
        if !self.similar.is_fetched() {
            missing.push(SectionKind::Similar);
        }
        missing
    }

    /// Display name: the detail name, falling back to the listing name
    pub fn name(&self) -> Option<&str> {
        self.detail
            .data()
            .map(|d| d.name.as_str())
            .or(self.listing_name.as_deref())
    }

    /// First error recorded on any section, detail first
    pub fn first_error(&self) -> Option<&str> {
        self.detail
            .error()
            .or_else(|| self.offers.error())
            .or_else(|| self.reviews.error())
            .or_else(|| self.price_history.values().find_map(|s| s.error()))
            .or_else(|| self.similar.error())
    }
}
