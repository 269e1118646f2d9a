//! Scraper module - the scrape pipeline
//!
//! This module contains:
//! - The rate-limited request scheduler with retry and backoff
//! - Parsers that turn source payloads into model types
//! - Category discovery, listing pagination and product aggregation
//! - The coordinator that drives a run against the job ledger

mod aggregator;
mod coordinator;
mod discoverer;
mod paginator;
pub mod parser;
mod scheduler;

pub use aggregator::ProductAggregator;
pub use coordinator::{run_pipeline, Coordinator, Mode};
pub use discoverer::{select_categories, CategoryDiscoverer};
pub use paginator::Paginator;
pub use parser::ListingPage;
pub use scheduler::{classify_response, Outcome, Scheduler, SchedulerStats};
