//! Price Harvest: a resumable catalog scraper
//!
//! This crate discovers catalog categories, walks their paginated product
//! listings, aggregates per-product detail from several source endpoints, and
//! consolidates everything into analysis-ready JSON/CSV exports. All outbound
//! calls go through one rate-limited scheduler, and a SQLite job ledger makes
//! re-runs skip work that was already persisted.

pub mod config;
pub mod model;
pub mod output;
pub mod scraper;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Price Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Category discovery failed: {0}")]
    Discovery(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure of a single call against the catalog source
///
/// The scheduler turns every transport result into either a JSON payload or
/// one of these. Retry decisions are made on the variant, never on messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Network, timeout or HTTP-level failure (403, 408, 5xx, unreadable body)
    #[error("Transport failure for {url}: {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Explicit throttling signal from the source (HTTP 429)
    #[error("Rate limited by source at {url}")]
    RateLimited { url: String },

    /// The entity no longer exists (HTTP 404/410)
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// The source refused the request as malformed (other 4xx)
    #[error("Request rejected with HTTP {status}: {url}")]
    Rejected { url: String, status: u16 },

    /// The response lacks fields required to build a section
    #[error("Unexpected {resource} response: {message}")]
    Schema { resource: String, message: String },
}

impl SourceError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::RateLimited { .. })
    }

    /// Returns true if the source signalled throttling
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true if the entity is gone from the source
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Builds a schema error for the named resource
    pub fn schema(resource: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for Price Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Category, ListingEntry, ProductRecord};
pub use state::{EntityKind, JobStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transport = SourceError::Transport {
            url: "https://example.com".to_string(),
            status: Some(503),
            message: "HTTP 503".to_string(),
        };
        assert!(transport.is_retryable());

        let limited = SourceError::RateLimited {
            url: "https://example.com".to_string(),
        };
        assert!(limited.is_retryable());
        assert!(limited.is_rate_limit());

        let gone = SourceError::NotFound {
            url: "https://example.com".to_string(),
        };
        assert!(!gone.is_retryable());
        assert!(gone.is_not_found());

        let rejected = SourceError::Rejected {
            url: "https://example.com".to_string(),
            status: 400,
        };
        assert!(!rejected.is_retryable());

        assert!(!SourceError::schema("offers", "missing offers array").is_retryable());
    }
}
