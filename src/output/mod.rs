//! Output module for consolidated exports and run reports
//!
//! This module handles:
//! - Consolidating every persisted product record into JSON/CSV exports
//! - Computing summary statistics
//! - Printing the end-of-run report

mod report;
mod rows;
pub mod stats;

pub use report::{print_run_report, JobTally, RunReport};
pub use rows::ProductRow;
pub use stats::{compute_summary, CategoryCount, PriceDistribution, SummaryStatistics};

use crate::config::OutputFormat;
use crate::model::ProductRecord;
use crate::storage::DocumentStore;
use crate::{HarvestError, Result};
use std::path::PathBuf;

pub const PRODUCTS_JSON: &str = "all_products.json";
pub const PRODUCTS_CSV: &str = "all_products.csv";
pub const SUMMARY_JSON: &str = "summary_stats.json";

/// Result of a consolidation pass
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub summary: SummaryStatistics,
    pub files: Vec<PathBuf>,
}

/// Rebuilds the consolidated exports from every persisted product record
///
/// Records without a fetched detail section are left out of both exports
/// and counted in the summary. Output is fully determined by the stored
/// documents.
///
/// # Arguments
///
/// * `store` - The document store to read from and write into
/// * `format` - Which product exports to write; the summary is always written
/// * `primary_interval` - Price history interval summarized in the CSV
pub fn consolidate(
    store: &DocumentStore,
    format: OutputFormat,
    primary_interval: Option<&str>,
) -> Result<Consolidation> {
    let scan = store.load_all_products()?;
    let listings = store.list_listings()?;
    let index = match store.load_categories() {
        Ok(index) => index.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Category index is unreadable, names may be missing: {}", e);
            Vec::new()
        }
    };

    let (exported, excluded): (Vec<&ProductRecord>, Vec<&ProductRecord>) =
        scan.records.iter().partition(|r| r.is_viable());

    for record in &excluded {
        tracing::debug!("Leaving product {} out of the exports: no detail", record.product_id);
    }

    let summary = compute_summary(
        &exported,
        excluded.len(),
        scan.unreadable.len(),
        &listings,
        &index,
    );

    let mut files = Vec::new();

    if format.includes_json() {
        files.push(store.write_consolidated_json(PRODUCTS_JSON, &exported)?);
    }

    if format.includes_csv() {
        let rows: Vec<ProductRow> = exported
            .iter()
            .map(|r| ProductRow::from_record(r, primary_interval))
            .collect();
        files.push(store.write_consolidated_bytes(PRODUCTS_CSV, &render_csv(&rows)?)?);
    }

    files.push(store.write_consolidated_json(SUMMARY_JSON, &summary)?);

    tracing::info!(
        "Consolidated {} products ({} left out, {} unreadable)",
        summary.total_products,
        summary.excluded_products,
        summary.unreadable_files
    );

    Ok(Consolidation { summary, files })
}

/// Renders rows as CSV; the header is written even when there are no rows
fn render_csv(rows: &[ProductRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(ProductRow::HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| HarvestError::Io(e.into_error()))
}
