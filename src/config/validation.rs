use crate::config::types::{
    Config, EndpointsConfig, ListingConfig, OutputConfig, ProductsConfig, SchedulerConfig,
    SourceConfig,
};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_endpoints(&config.endpoints)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_listing_config(&config.listing)?;
    validate_products_config(&config.products)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    validate_path_segment("country", &config.country)?;
    validate_path_segment("locale", &config.locale)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    for (name, value) in &config.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid header name '{}'",
                name
            )));
        }
        if HeaderValue::from_str(value).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid value for header '{}'",
                name
            )));
        }
    }

    Ok(())
}

/// Country and locale are spliced into url paths
fn validate_path_segment(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ConfigError::Validation(format!(
            "{} must contain only ASCII letters, digits, '-' or '_', got '{}'",
            name, value
        )));
    }

    Ok(())
}

fn validate_endpoints(config: &EndpointsConfig) -> Result<(), ConfigError> {
    let templates = [
        ("categories", &config.categories),
        ("listing", &config.listing),
        ("detail", &config.detail),
        ("offers", &config.offers),
        ("reviews", &config.reviews),
        ("price-history", &config.price_history),
        ("similar", &config.similar),
    ];

    for (name, template) in templates {
        if !template.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}' must start with '/', got '{}'",
                name, template
            )));
        }
    }

    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.max_backoff_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms ({}) must be >= backoff-base-ms ({})",
            config.max_backoff_ms, config.backoff_base_ms
        )));
    }

    if config.rate_limit_multiplier < 1 {
        return Err(ConfigError::Validation(
            "rate-limit-multiplier must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 1000, got {}",
            config.page_size
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_products_config(config: &ProductsConfig) -> Result<(), ConfigError> {
    if config.price_history_intervals.is_empty() {
        return Err(ConfigError::Validation(
            "price-history-intervals must name at least one interval".to_string(),
        ));
    }

    for interval in &config.price_history_intervals {
        validate_path_segment("price history interval", interval)?;
    }

    let mut seen = std::collections::HashSet::new();
    for interval in &config.price_history_intervals {
        if !seen.insert(interval) {
            return Err(ConfigError::Validation(format!(
                "price history interval '{}' is listed twice",
                interval
            )));
        }
    }

    validate_path_segment("price-history-granularity", &config.price_history_granularity)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
