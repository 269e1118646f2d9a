//! End-to-end runs of the full pipeline

use crate::catalog::{mount_catalog, request_count, run, test_config, ProductFixture};
use price_harvest::scraper::Mode;
use price_harvest::state::{EntityKind, JobStatus};
use price_harvest::storage::{Ledger, SqliteLedger};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::MockServer;

const CONSOLIDATED: [&str; 3] = ["all_products.json", "all_products.csv", "summary_stats.json"];

fn read_consolidated(data_dir: &Path) -> Vec<Vec<u8>> {
    CONSOLIDATED
        .iter()
        .map(|name| fs::read(data_dir.join("consolidated").join(name)).expect("export exists"))
        .collect()
}

/// CSV rows keyed by product id, each row keyed by column name
fn read_csv_rows(data_dir: &Path) -> HashMap<String, HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(data_dir.join("consolidated/all_products.csv"))
        .expect("csv export exists");
    let headers = reader.headers().expect("csv header").clone();

    reader
        .records()
        .map(|record| {
            let record = record.expect("csv row");
            let row: HashMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();
            (row["product_id"].clone(), row)
        })
        .collect()
}

fn read_summary(data_dir: &Path) -> Value {
    let bytes = fs::read(data_dir.join("consolidated/summary_stats.json")).expect("summary exists");
    serde_json::from_slice(&bytes).expect("summary is JSON")
}

#[tokio::test]
async fn test_full_run_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(
        &server,
        &[
            ProductFixture::ok("101", "Kettle A", 20.0),
            ProductFixture::ok("102", "Kettle B", 30.0),
        ],
    )
    .await;

    let report = run(test_config(&server, dir.path()), Mode::Full).await;

    assert!(report.is_clean());
    assert_eq!(report.categories.done, 1);
    assert_eq!(report.products.done, 2);
    // index + one listing page + 5 sections for each product
    assert_eq!(request_count(&server).await, 12);

    assert!(dir.path().join("categories/categories.json").exists());
    assert!(dir.path().join("categories/category_10.json").exists());
    assert!(dir.path().join("products/product_101.json").exists());
    assert!(dir.path().join("ledger.db").exists());

    let rows = read_csv_rows(dir.path());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows["101"]["name"], "Kettle A");
    assert_eq!(rows["101"]["lowest_price"], "20.0");
    assert_eq!(rows["101"]["merchant"], "Shop B");
    assert_eq!(rows["101"]["total_offers"], "2");
    assert_eq!(rows["102"]["history_min"], "30.0");
    assert_eq!(rows["102"]["similar_count"], "2");

    let summary = read_summary(dir.path());
    assert_eq!(summary["total_products"], 2);
    assert_eq!(summary["complete_products"], 2);
    assert_eq!(summary["total_listed_products"], 2);
    assert_eq!(summary["categories"][0]["name"], "Kettles");
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(
        &server,
        &[
            ProductFixture::ok("101", "Kettle A", 20.0),
            ProductFixture::ok("102", "Kettle B", 30.0),
            ProductFixture::ok("103", "Kettle C", 45.5),
        ],
    )
    .await;

    run(test_config(&server, dir.path()), Mode::Full).await;
    let first = read_consolidated(dir.path());
    let requests_after_first = request_count(&server).await;

    let report = run(test_config(&server, dir.path()), Mode::Full).await;
    let second = read_consolidated(dir.path());

    assert_eq!(first, second);
    assert_eq!(request_count(&server).await, requests_after_first);
    assert_eq!(report.scheduler.requests, 0);
    assert_eq!(report.categories.skipped, 1);
    assert_eq!(report.products.skipped, 3);
    assert_eq!(report.products.attempted(), 0);
}

#[tokio::test]
async fn test_detail_failure_marks_product_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(
        &server,
        &[
            ProductFixture::ok("101", "Kettle A", 20.0),
            ProductFixture {
                detail_status: 503,
                ..ProductFixture::ok("102", "Kettle B", 30.0)
            },
        ],
    )
    .await;

    let report = run(test_config(&server, dir.path()), Mode::Full).await;

    assert_eq!(report.products.done, 1);
    assert_eq!(report.products.failed, 1);
    assert!(!report.is_clean());
    assert_eq!(report.failed[0].entity_id, "102");

    let ledger = SqliteLedger::new(&dir.path().join("ledger.db")).unwrap();
    let entry = ledger
        .get_entry(EntityKind::Product, "102")
        .unwrap()
        .expect("ledger entry");
    assert_eq!(entry.status, JobStatus::Failed);
    assert!(entry.last_error.is_some());

    // the partial record is kept, but stays out of the exports
    assert!(dir.path().join("products/product_102.json").exists());
    let rows = read_csv_rows(dir.path());
    assert!(rows.contains_key("101"));
    assert!(!rows.contains_key("102"));
    assert_eq!(read_summary(dir.path())["excluded_products"], 1);
}

#[tokio::test]
async fn test_offers_failure_leaves_offer_columns_empty() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(
        &server,
        &[ProductFixture {
            offers_status: 500,
            ..ProductFixture::ok("101", "Kettle A", 20.0)
        }],
    )
    .await;

    let report = run(test_config(&server, dir.path()), Mode::Full).await;
    assert_eq!(report.products.done, 1);

    let rows = read_csv_rows(dir.path());
    let row = &rows["101"];
    assert_eq!(row["name"], "Kettle A");
    assert_eq!(row["lowest_price"], "");
    assert_eq!(row["merchant"], "");
    assert_eq!(row["offers_fetched"], "false");
    assert_eq!(row["average_rating"], "4.5");
    assert_eq!(row["history_max"], "30.0");
}

#[tokio::test]
async fn test_summary_counts_partial_records() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(
        &server,
        &[
            ProductFixture::ok("101", "Kettle A", 20.0),
            ProductFixture::ok("102", "Kettle B", 30.0),
            ProductFixture {
                reviews_status: 502,
                ..ProductFixture::ok("103", "Kettle C", 40.0)
            },
        ],
    )
    .await;

    run(test_config(&server, dir.path()), Mode::Full).await;

    let summary = read_summary(dir.path());
    assert_eq!(summary["total_products"], 3);
    assert_eq!(summary["complete_products"], 2);
    assert_eq!(summary["partial_products"], 1);
    assert_eq!(summary["review_coverage"]["with_reviews"], 2);
    assert_eq!(summary["price_distribution"]["count"], 3);
}

#[tokio::test]
async fn test_unreachable_source_fails_the_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    // nothing mounted: every call is a 404

    let config = test_config(&server, dir.path());
    let transport =
        std::sync::Arc::new(price_harvest::source::HttpTransport::new(&config.source).unwrap());
    let result = price_harvest::scraper::run_pipeline(config, "hash", Mode::Full, transport).await;

    assert!(matches!(result, Err(price_harvest::HarvestError::Discovery(_))));
}
