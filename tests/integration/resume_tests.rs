//! Resumption across runs and the split run modes

use crate::catalog::{mount_catalog, request_count, run, test_config, ProductFixture};
use price_harvest::scraper::Mode;
use price_harvest::state::{EntityKind, JobStatus};
use price_harvest::storage::{Ledger, RunStatus, SqliteLedger};
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_failed_product_is_retried_on_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let healthy = [
        ProductFixture::ok("101", "Kettle A", 20.0),
        ProductFixture::ok("102", "Kettle B", 30.0),
    ];
    mount_catalog(
        &server,
        &[
            healthy[0].clone(),
            ProductFixture {
                detail_status: 503,
                ..healthy[1].clone()
            },
        ],
    )
    .await;

    let first = run(test_config(&server, dir.path()), Mode::Full).await;
    assert_eq!(first.products.failed, 1);

    // the source recovers
    server.reset().await;
    mount_catalog(&server, &healthy).await;

    let second = run(test_config(&server, dir.path()), Mode::Full).await;

    assert!(second.is_clean());
    assert_eq!(second.products.done, 1);
    assert_eq!(second.products.skipped, 1);
    // offers, reviews, history and similar were kept from the first run
    assert_eq!(request_count(&server).await, 1);

    let ledger = SqliteLedger::new(&dir.path().join("ledger.db")).unwrap();
    let entry = ledger.get_entry(EntityKind::Product, "102").unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Done);
    assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn test_categories_then_products_then_consolidate() {
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

    let listed = run(test_config(&server, dir.path()), Mode::Categories).await;
    assert_eq!(listed.categories.done, 1);
    assert_eq!(listed.products.attempted(), 0);
    assert!(listed.summary.is_none());
    assert_eq!(request_count(&server).await, 2);
    assert!(!dir.path().join("consolidated/all_products.csv").exists());

    let scraped = run(test_config(&server, dir.path()), Mode::Products).await;
    assert_eq!(scraped.products.done, 2);
    assert_eq!(request_count(&server).await, 12);

    let consolidated = run(test_config(&server, dir.path()), Mode::Consolidate).await;
    assert_eq!(consolidated.scheduler.requests, 0);
    assert_eq!(consolidated.summary.unwrap().total_products, 2);
    assert!(dir.path().join("consolidated/all_products.csv").exists());

    let ledger = SqliteLedger::new(&dir.path().join("ledger.db")).unwrap();
    let latest = ledger.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.mode, "consolidate");
    assert_eq!(latest.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_category_filter_selects_descendants() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server, &[ProductFixture::ok("101", "Kettle A", 20.0)]).await;

    // 1 is the parent of the only leaf category
    let mut config = test_config(&server, dir.path());
    config.categories.ids = vec![1];
    let report = run(config, Mode::Categories).await;
    assert_eq!(report.categories.done, 1);

    // an unrelated id selects nothing from the index and is listed on its own
    let other = TempDir::new().unwrap();
    let mut config = test_config(&server, other.path());
    config.categories.ids = vec![77];
    let report = run(config, Mode::Categories).await;
    assert_eq!(report.categories.done + report.categories.failed, 1);
    assert!(!other.path().join("categories/category_10.json").exists());
}
