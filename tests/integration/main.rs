//! Integration tests for the scrape pipeline
//!
//! These tests use wiremock to stand in for the catalog source and run the
//! full pipeline end-to-end through the HTTP transport.

mod catalog;
mod pipeline_tests;
mod resume_tests;
