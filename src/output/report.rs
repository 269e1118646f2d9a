//! End-of-run report
//!
//! Printed to stdout after every run so an operator can see what happened
//! without opening the ledger.

use crate::output::SummaryStatistics;
use crate::scraper::SchedulerStats;
use crate::state::{EntityKind, JobStatus};
use crate::storage::LedgerEntry;
use std::collections::HashMap;

/// Per-run outcome counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTally {
    pub done: u64,
    /// Attempted this run without a usable result
    pub failed: u64,
    /// Already done by an earlier run
    pub skipped: u64,
}

impl JobTally {
    pub fn attempted(&self) -> u64 {
        self.done + self.failed
    }
}

/// Everything shown in the end-of-run report
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub mode: String,
    pub categories: JobTally,
    pub products: JobTally,
    pub scheduler: SchedulerStats,

    /// Ledger totals across all runs, by status
    pub ledger_counts: Vec<(EntityKind, HashMap<JobStatus, u64>)>,

    /// Entities currently failed in the ledger
    pub failed: Vec<LedgerEntry>,

    /// Present when the run consolidated
    pub summary: Option<SummaryStatistics>,
}

impl RunReport {
    /// True if no entity is left failed in the ledger
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Prints the report to stdout
pub fn print_run_report(report: &RunReport) {
    println!("=== Run {} ({}) ===\n", report.run_id, report.mode);

    println!("This run:");
    print_tally("Categories", &report.categories);
    print_tally("Products", &report.products);
    println!();

    println!("Requests:");
    println!("  Sent: {}", report.scheduler.requests);
    println!("  Retried: {}", report.scheduler.retries);
    println!("  Rate limited: {}", report.scheduler.rate_limited);
    println!("  Exhausted: {}", report.scheduler.exhausted);
    println!();

    println!("Ledger:");
    for (kind, counts) in &report.ledger_counts {
        let count = |status: JobStatus| counts.get(&status).copied().unwrap_or(0);
        println!(
            "  {}: {} done, {} failed, {} pending",
            kind,
            count(JobStatus::Done),
            count(JobStatus::Failed),
            count(JobStatus::Pending)
        );
    }
    println!();

    if let Some(summary) = &report.summary {
        println!("Consolidated:");
        println!(
            "  Products: {} ({} complete, {} partial)",
            summary.total_products, summary.complete_products, summary.partial_products
        );
        if summary.excluded_products > 0 || summary.unreadable_files > 0 {
            println!(
                "  Left out: {} without detail, {} unreadable",
                summary.excluded_products, summary.unreadable_files
            );
        }
        println!(
            "  Review coverage: {} ({:.1}%)",
            summary.review_coverage.with_reviews,
            summary.review_coverage.rate * 100.0
        );
        println!();
    }

    if !report.failed.is_empty() {
        println!("Failed ({}):", report.failed.len());
        for entry in &report.failed {
            println!(
                "  - {} {} (attempts: {}): {}",
                entry.kind,
                entry.entity_id,
                entry.attempts,
                entry.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }
}

fn print_tally(label: &str, tally: &JobTally) {
    println!(
        "  {}: {} done, {} failed, {} skipped",
        label, tally.done, tally.failed, tally.skipped
    );
}
