use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Price Harvest
///
/// Every section has defaults, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub endpoints: EndpointsConfig,
    pub scheduler: SchedulerConfig,
    pub listing: ListingConfig,
    pub products: ProductsConfig,
    pub categories: CategoriesConfig,
    pub output: OutputConfig,
}

/// Catalog source and session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Catalog site root, e.g. "https://www.pricerunner.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Country path segment used in API urls
    pub country: String,

    /// Locale segment used in API urls
    pub locale: String,

    /// User agent presented to the source
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Cookie header captured from an authenticated browser session
    pub cookie: Option<String>,

    /// Extra headers the session sends with every api call, e.g. a csrf token
    pub headers: BTreeMap<String, String>,

    /// Whether the session should run without a visible window
    pub headless: bool,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.pricerunner.com".to_string(),
            country: "uk".to_string(),
            locale: "UK".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            cookie: None,
            headers: BTreeMap::new(),
            headless: true,
            request_timeout_secs: 30,
        }
    }
}

/// Endpoint path templates, relative to `{base-url}/{country}/api`
///
/// Placeholders: `{locale}`, `{category_id}`, `{product_id}`, `{granularity}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub categories: String,
    pub listing: String,
    pub detail: String,
    pub offers: String,
    pub reviews: String,
    #[serde(rename = "price-history")]
    pub price_history: String,
    pub similar: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            categories: "/category-edge-rest/public/categories/{locale}".to_string(),
            listing: "/search-edge-rest/public/search/category/v4/{locale}/{category_id}"
                .to_string(),
            detail: "/product-detail-edge-rest/public/product-detail/v0/initial/{locale}/{category_id}/{product_id}"
                .to_string(),
            offers: "/product-detail-edge-rest/public/product-detail/v0/offers/{locale}/{product_id}"
                .to_string(),
            reviews: "/review-edge-rest/public/v2/products/reviews/overview/{locale}/{product_id}/"
                .to_string(),
            price_history: "/product-information-edge-rest/public/pricehistory/product/{product_id}/{locale}/{granularity}"
                .to_string(),
            similar: "/similar-edge-rest/public/search/products/similar/{locale}/{category_id}/{product_id}"
                .to_string(),
        }
    }
}

/// Request pacing and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lower bound of the random delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the random delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Total attempts per call, first attempt included
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff after the first failed attempt; doubles on each further failure
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff sleep (milliseconds)
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier applied when the source answers 429
    #[serde(rename = "rate-limit-multiplier")]
    pub rate_limit_multiplier: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            max_backoff_ms: 120_000,
            rate_limit_multiplier: 4,
        }
    }
}

/// Category listing pagination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Products requested per page
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Offset of the first page (the source counts from 1)
    #[serde(rename = "first-offset")]
    pub first_offset: u64,

    /// Hard cap on page requests per category
    #[serde(rename = "max-pages")]
    pub max_pages: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            first_offset: 1,
            max_pages: 500,
        }
    }
}

/// Per-product aggregation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductsConfig {
    /// Price history windows, one request each
    #[serde(rename = "price-history-intervals")]
    pub price_history_intervals: Vec<String>,

    /// Price history point granularity (DAY, WEEK, MONTH)
    #[serde(rename = "price-history-granularity")]
    pub price_history_granularity: String,

    #[serde(rename = "user-review-limit")]
    pub user_review_limit: u32,

    #[serde(rename = "pro-review-limit")]
    pub pro_review_limit: u32,

    #[serde(rename = "similar-limit")]
    pub similar_limit: u32,
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            price_history_intervals: vec![
                "THREE_MONTHS".to_string(),
                "SIX_MONTHS".to_string(),
                "ONE_YEAR".to_string(),
            ],
            price_history_granularity: "DAY".to_string(),
            user_review_limit: 100,
            pro_review_limit: 10,
            similar_limit: 20,
        }
    }
}

/// Category selection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    /// Restrict scraping to these category ids (and their descendants)
    pub ids: Vec<u64>,

    /// Re-fetch the category index even when one is already on disk
    pub rediscover: bool,
}

/// Which consolidated exports to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    Both,
}

impl OutputFormat {
    pub fn includes_json(&self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn includes_csv(&self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for documents, exports and the ledger database
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    pub format: OutputFormat,

    /// Keep raw source bodies under `raw/` for debugging
    #[serde(rename = "save-raw")]
    pub save_raw: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            format: OutputFormat::Both,
            save_raw: false,
        }
    }
}
