//! Storage module for persisting scrape state and results
//!
//! This module handles all durable state, including:
//! - SQLite job ledger initialization and schema management
//! - Per-entity job status for resumption
//! - Run tracking
//! - JSON documents for categories, listings and product records

mod documents;
mod schema;
mod sqlite;
mod traits;

pub use documents::{file_stem, DocumentStore, ProductScan};
pub use sqlite::SqliteLedger;
pub use traits::{Ledger, StorageError, StorageResult};

use crate::state::{EntityKind, JobStatus};

/// One row of the job ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub kind: EntityKind,
    pub entity_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: String,
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
