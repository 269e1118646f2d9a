//! Ledger trait and storage error types
//!
//! This module defines the trait interface for job ledger backends and
//! the error type shared by the ledger and the document store.

use crate::state::{EntityKind, JobStatus};
use crate::storage::{LedgerEntry, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for job ledger implementations
///
/// The ledger is the single source of truth for resumability: an entity is
/// skipped on a later run if and only if its status is `done`.
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `mode` - The pipeline mode the run executes
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status of a run and stamps its finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks every run still `running` as `interrupted`
    ///
    /// Returns the number of runs updated.
    fn mark_interrupted_runs(&mut self) -> StorageResult<usize>;

    // ===== Job Tracking =====

    /// Returns true if the entity was completed by an earlier attempt
    fn is_done(&self, kind: EntityKind, entity_id: &str) -> StorageResult<bool>;

    /// Records the start of an attempt: status `pending`, attempts + 1
    fn begin(&mut self, kind: EntityKind, entity_id: &str) -> StorageResult<()>;

    /// Records the result of an attempt
    fn mark(
        &mut self,
        kind: EntityKind,
        entity_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets the ledger entry for an entity, if it was ever attempted
    fn get_entry(&self, kind: EntityKind, entity_id: &str) -> StorageResult<Option<LedgerEntry>>;

    // ===== Statistics =====

    /// Counts entities of one kind by status
    fn count_by_status(&self, kind: EntityKind) -> StorageResult<HashMap<JobStatus, u64>>;

    /// Lists entities of one kind in the given status, ordered by id
    fn entries_with_status(
        &self,
        kind: EntityKind,
        status: JobStatus,
    ) -> StorageResult<Vec<LedgerEntry>>;
}
