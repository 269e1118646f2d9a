//! Configuration module for Price Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is passed explicitly to each component at
//! construction; nothing reads settings from global state.
//!
//! # Example
//!
//! ```no_run
//! use price_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Max attempts per call: {}", config.scheduler.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoriesConfig, Config, EndpointsConfig, ListingConfig, OutputConfig, OutputFormat,
    ProductsConfig, SchedulerConfig, SourceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, hash_content, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
