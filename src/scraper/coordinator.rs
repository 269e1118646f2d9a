//! Scrape coordinator - main pipeline orchestration
//!
//! This module contains the pipeline that coordinates a run:
//! - Opening the document store and job ledger, recording the run
//! - Discovering categories and paging through their listings
//! - Aggregating product detail for every listed product
//! - Consolidating the exports
//!
//! Every category and product goes through the same sequence: skip if the
//! ledger says done, otherwise begin, fetch, write the result, then mark.

use crate::config::Config;
use crate::model::{Category, ListingEntry};
use crate::output::{consolidate, JobTally, RunReport, SummaryStatistics};
use crate::scraper::aggregator::ProductAggregator;
use crate::scraper::discoverer::{select_categories, CategoryDiscoverer};
use crate::scraper::paginator::Paginator;
use crate::scraper::scheduler::Scheduler;
use crate::source::{Endpoints, Transport};
use crate::state::{EntityKind, JobStatus};
use crate::storage::{DocumentStore, Ledger, RunStatus, SqliteLedger};
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Which part of the pipeline a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Discovery, listings, products, then consolidation
    Full,
    /// Discovery and listings only
    Categories,
    /// Products of already stored listings
    Products,
    /// Rebuild the exports from stored records
    Consolidate,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Categories => "categories",
            Self::Products => "products",
            Self::Consolidate => "consolidate",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    config: Config,
    store: DocumentStore,
    ledger: SqliteLedger,
    scheduler: Scheduler,
    endpoints: Endpoints,
    mode: Mode,
    run_id: i64,
    categories: JobTally,
    products: JobTally,
    summary: Option<SummaryStatistics>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration, recorded on the run
    /// * `mode` - Which part of the pipeline to run
    /// * `transport` - Transport all source calls go through
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and the run recorded
    /// * `Err(HarvestError)` - The data directory or ledger could not be opened
    pub fn new(
        config: Config,
        config_hash: &str,
        mode: Mode,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let store = DocumentStore::new(&config.output.data_dir)?;
        let mut ledger = SqliteLedger::new(&store.ledger_path())?;

        if let Some(latest) = ledger.get_latest_run()? {
            if latest.status == RunStatus::Running {
                tracing::info!(
                    "Run {} ({}) did not finish; unfinished work will be retried",
                    latest.id,
                    latest.mode
                );
            }
        }
        ledger.mark_interrupted_runs()?;

        let run_id = ledger.create_run(mode.as_str(), config_hash)?;
        let scheduler = Scheduler::new(config.scheduler.clone(), transport);
        let endpoints = Endpoints::new(&config);

        Ok(Self {
            config,
            store,
            ledger,
            scheduler,
            endpoints,
            mode,
            run_id,
            categories: JobTally::default(),
            products: JobTally::default(),
            summary: None,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the pipeline and returns the end-of-run report
    ///
    /// Failed categories and products are recorded in the ledger and do not
    /// fail the run. Errors returned here are unrecoverable: discovery could
    /// not reach the source, or local storage failed.
    pub async fn run(&mut self) -> Result<RunReport> {
        tracing::info!("Starting {} run {}", self.mode, self.run_id);
        let start_time = std::time::Instant::now();

        let outcome = self.run_mode().await;

        let status = if outcome.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.ledger.finish_run(self.run_id, status)?;
        outcome?;

        tracing::info!(
            "Run {} finished in {:?}",
            self.run_id,
            start_time.elapsed()
        );
        self.report()
    }

    async fn run_mode(&mut self) -> Result<()> {
        match self.mode {
            Mode::Full => {
                let categories = self.discover().await?;
                self.list_categories(&categories).await?;
                let selected: HashSet<u64> = categories.iter().map(|c| c.id).collect();
                self.scrape_products(Some(&selected)).await?;
                self.consolidate()
            }
            Mode::Categories => {
                let categories = self.discover().await?;
                self.list_categories(&categories).await
            }
            Mode::Products => {
                let selected = self.stored_selection();
                self.scrape_products(selected.as_ref()).await
            }
            Mode::Consolidate => self.consolidate(),
        }
    }

    async fn discover(&mut self) -> Result<Vec<Category>> {
        let discoverer =
            CategoryDiscoverer::new(&self.endpoints, &self.store, self.config.output.save_raw);
        let categories = discoverer
            .discover(&mut self.scheduler, &self.config.categories)
            .await?;

        tracing::info!("{} categories selected", categories.len());
        Ok(categories)
    }

    /// Category filter for products mode, resolved against the stored index
    fn stored_selection(&self) -> Option<HashSet<u64>> {
        let filter = &self.config.categories.ids;
        if filter.is_empty() {
            return None;
        }

        let index = match self.store.load_categories() {
            Ok(index) => index.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Category index is unreadable, filtering by id only: {}", e);
                Vec::new()
            }
        };
        Some(
            select_categories(index, filter)
                .iter()
                .map(|c| c.id)
                .collect(),
        )
    }

    /// Pages through every category not yet listed
    async fn list_categories(&mut self, categories: &[Category]) -> Result<()> {
        for category in categories {
            let entity_id = category.id.to_string();

            if self.ledger.is_done(EntityKind::Category, &entity_id)? {
                tracing::debug!("Category {} already listed, skipping", category.id);
                self.categories.skipped += 1;
                continue;
            }

            self.ledger.begin(EntityKind::Category, &entity_id)?;
            tracing::info!("Listing category {} ({})", category.id, category.name);

            let result = Paginator::new(
                &mut self.scheduler,
                &self.endpoints,
                &self.store,
                category,
                &self.config.listing,
                self.config.output.save_raw,
            )
            .list_products()
            .await;

            match result {
                Ok(_) => {
                    self.ledger
                        .mark(EntityKind::Category, &entity_id, JobStatus::Done, None)?;
                    self.categories.done += 1;
                }
                Err(HarvestError::Source(e)) => {
                    tracing::warn!("Listing category {} failed: {}", category.id, e);
                    self.ledger.mark(
                        EntityKind::Category,
                        &entity_id,
                        JobStatus::Failed,
                        Some(&e.to_string()),
                    )?;
                    self.categories.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Aggregates every listed product not yet done
    ///
    /// Listings are read from disk, so products mode works on the listings an
    /// earlier categories run left behind. A product listed in several
    /// categories is scraped once, under the lowest category id.
    async fn scrape_products(&mut self, selected: Option<&HashSet<u64>>) -> Result<()> {
        let entries = self.listed_entries(selected)?;
        if entries.is_empty() {
            tracing::warn!("No listed products found; list categories first");
            return Ok(());
        }

        tracing::info!("{} unique products listed", entries.len());

        let aggregator = ProductAggregator::new(
            &self.endpoints,
            &self.store,
            &self.config.products.price_history_intervals,
            self.config.output.save_raw,
        );

        for (position, entry) in entries.iter().enumerate() {
            let entity_id = entry.product_id.as_str();

            if self.ledger.is_done(EntityKind::Product, entity_id)? {
                self.products.skipped += 1;
                continue;
            }

            self.ledger.begin(EntityKind::Product, entity_id)?;

            let previous = match self.store.load_product(entity_id) {
                Ok(previous) => previous,
                Err(e) => {
                    tracing::warn!("Stored record for {} is unreadable, refetching: {}", entity_id, e);
                    None
                }
            };

            let record = aggregator
                .fetch_product(&mut self.scheduler, entry, previous)
                .await?;
            self.store.save_product(&record)?;

            if record.is_viable() {
                self.ledger
                    .mark(EntityKind::Product, entity_id, JobStatus::Done, None)?;
                self.products.done += 1;
            } else {
                let error = record.first_error().unwrap_or("product detail missing");
                tracing::warn!("Product {} failed: {}", entity_id, error);
                self.ledger
                    .mark(EntityKind::Product, entity_id, JobStatus::Failed, Some(error))?;
                self.products.failed += 1;
            }

            let processed = position + 1;
            if processed % 25 == 0 {
                tracing::info!(
                    "Progress: {}/{} products ({} done, {} failed, {} skipped)",
                    processed,
                    entries.len(),
                    self.products.done,
                    self.products.failed,
                    self.products.skipped
                );
            }
        }

        Ok(())
    }

    fn listed_entries(&self, selected: Option<&HashSet<u64>>) -> Result<Vec<ListingEntry>> {
        let mut seen = HashSet::new();
        let entries = self
            .store
            .list_listings()?
            .into_iter()
            .filter(|l| selected.map_or(true, |s| s.contains(&l.category_id)))
            .flat_map(|l| l.entries)
            .filter(|e| seen.insert(e.product_id.clone()))
            .collect();
        Ok(entries)
    }

    fn consolidate(&mut self) -> Result<()> {
        let primary_interval = self
            .config
            .products
            .price_history_intervals
            .first()
            .map(String::as_str);
        let consolidation = consolidate(&self.store, self.config.output.format, primary_interval)?;

        for file in &consolidation.files {
            tracing::info!("Wrote {}", file.display());
        }
        self.summary = Some(consolidation.summary);
        Ok(())
    }

    fn report(&self) -> Result<RunReport> {
        let mut ledger_counts = Vec::new();
        let mut failed = Vec::new();

        for kind in EntityKind::all() {
            ledger_counts.push((kind, self.ledger.count_by_status(kind)?));
            failed.extend(self.ledger.entries_with_status(kind, JobStatus::Failed)?);
        }

        Ok(RunReport {
            run_id: self.run_id,
            mode: self.mode.to_string(),
            categories: self.categories,
            products: self.products,
            scheduler: self.scheduler.stats(),
            ledger_counts,
            failed,
            summary: self.summary.clone(),
        })
    }
}

/// Runs one pipeline mode end to end
///
/// # Example
///
/// ```no_run
/// use price_harvest::config::Config;
/// use price_harvest::scraper::{run_pipeline, Mode};
/// use price_harvest::source::HttpTransport;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let transport = Arc::new(HttpTransport::new(&config.source)?);
/// let report = run_pipeline(config, "hash", Mode::Full, transport).await?;
/// println!("{} products done", report.products.done);
/// # Ok(())
/// # }
/// ```
pub async fn run_pipeline(
    config: Config,
    config_hash: &str,
    mode: Mode,
    transport: Arc<dyn Transport>,
) -> Result<RunReport> {
    let mut coordinator = Coordinator::new(config, config_hash, mode, transport)?;
    coordinator.run().await
}
