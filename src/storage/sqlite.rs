//! SQLite ledger implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::state::{EntityKind, JobStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, StorageError, StorageResult};
use crate::storage::{LedgerEntry, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteLedger)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let kind: String = row.get(0)?;
    let status: String = row.get(2)?;
    Ok(LedgerEntry {
        kind: EntityKind::from_db_string(&kind).unwrap_or(EntityKind::Product),
        entity_id: row.get(1)?,
        // An unknown status is never trusted as done
        status: JobStatus::from_db_string(&status).unwrap_or(JobStatus::Failed),
        attempts: row.get(3)?,
        last_error: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Ledger for SqliteLedger {
    // ===== Run Management =====

    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![mode, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn mark_interrupted_runs(&mut self) -> StorageResult<usize> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    // ===== Job Tracking =====

    fn is_done(&self, kind: EntityKind, entity_id: &str) -> StorageResult<bool> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM jobs WHERE entity_type = ?1 AND entity_id = ?2",
                params![kind.to_db_string(), entity_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status
            .and_then(|s| JobStatus::from_db_string(&s))
            .map(|s| s.is_terminal_success())
            .unwrap_or(false))
    }

    fn begin(&mut self, kind: EntityKind, entity_id: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (entity_type, entity_id, status, attempts, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                status = excluded.status,
                attempts = attempts + 1,
                updated_at = excluded.updated_at",
            params![
                kind.to_db_string(),
                entity_id,
                JobStatus::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(())
    }

    fn mark(
        &mut self,
        kind: EntityKind,
        entity_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (entity_type, entity_id, status, attempts, last_error, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                status = excluded.status,
                last_error = excluded.last_error,
                updated_at = excluded.updated_at",
            params![kind.to_db_string(), entity_id, status.to_db_string(), error, now],
        )?;
        Ok(())
    }

    fn get_entry(&self, kind: EntityKind, entity_id: &str) -> StorageResult<Option<LedgerEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT entity_type, entity_id, status, attempts, last_error, updated_at
                 FROM jobs WHERE entity_type = ?1 AND entity_id = ?2",
                params![kind.to_db_string(), entity_id],
                entry_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    // ===== Statistics =====

    fn count_by_status(&self, kind: EntityKind) -> StorageResult<HashMap<JobStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM jobs WHERE entity_type = ?1 GROUP BY status",
        )?;

        let rows = stmt.query_map(params![kind.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = JobStatus::from_db_string(&status) {
                *counts.entry(status).or_insert(0) += count as u64;
            }
        }

        Ok(counts)
    }

    fn entries_with_status(
        &self,
        kind: EntityKind,
        status: JobStatus,
    ) -> StorageResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, entity_id, status, attempts, last_error, updated_at
             FROM jobs WHERE entity_type = ?1 AND status = ?2 ORDER BY entity_id",
        )?;

        let entries = stmt
            .query_map(
                params![kind.to_db_string(), status.to_db_string()],
                entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteLedger::new_in_memory().is_ok());
    }

    #[test]
    fn test_create_and_finish_run() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let run_id = ledger.create_run("full", "test_hash").unwrap();
        assert!(run_id > 0);

        let run = ledger.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.mode, "full");
        assert!(run.finished_at.is_none());

        ledger.finish_run(run_id, RunStatus::Completed).unwrap();
        let run = ledger.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_missing_run() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        assert!(matches!(
            ledger.finish_run(99, RunStatus::Failed),
            Err(StorageError::RunNotFound(99))
        ));
        assert!(ledger.get_latest_run().unwrap().is_none());
    }

    #[test]
    fn test_running_runs_become_interrupted() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let stale = ledger.create_run("products", "h").unwrap();

        assert_eq!(ledger.mark_interrupted_runs().unwrap(), 1);
        assert_eq!(
            ledger.get_run(stale).unwrap().status,
            RunStatus::Interrupted
        );
        assert_eq!(ledger.mark_interrupted_runs().unwrap(), 0);
    }

    #[test]
    fn test_unknown_entity_is_not_done() {
        let ledger = SqliteLedger::new_in_memory().unwrap();
        assert!(!ledger.is_done(EntityKind::Product, "123").unwrap());
        assert!(ledger.get_entry(EntityKind::Product, "123").unwrap().is_none());
    }

    #[test]
    fn test_begin_then_done() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();

        ledger.begin(EntityKind::Product, "123").unwrap();
        assert!(!ledger.is_done(EntityKind::Product, "123").unwrap());

        ledger
            .mark(EntityKind::Product, "123", JobStatus::Done, None)
            .unwrap();
        assert!(ledger.is_done(EntityKind::Product, "123").unwrap());

        // Same id, other kind
        assert!(!ledger.is_done(EntityKind::Category, "123").unwrap());
    }

    #[test]
    fn test_failed_attempts_accumulate() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();

        ledger.begin(EntityKind::Category, "94").unwrap();
        ledger
            .mark(EntityKind::Category, "94", JobStatus::Failed, Some("HTTP 503"))
            .unwrap();
        ledger.begin(EntityKind::Category, "94").unwrap();

        let entry = ledger.get_entry(EntityKind::Category, "94").unwrap().unwrap();
        assert_eq!(entry.status, JobStatus::Pending);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_error.as_deref(), Some("HTTP 503"));

        ledger
            .mark(EntityKind::Category, "94", JobStatus::Done, None)
            .unwrap();
        let entry = ledger.get_entry(EntityKind::Category, "94").unwrap().unwrap();
        assert_eq!(entry.status, JobStatus::Done);
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn test_counts_and_failed_listing() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();

        for (id, status) in [
            ("3", JobStatus::Failed),
            ("1", JobStatus::Done),
            ("2", JobStatus::Failed),
        ] {
            ledger.begin(EntityKind::Product, id).unwrap();
            ledger
                .mark(EntityKind::Product, id, status, Some("boom"))
                .unwrap();
        }
        ledger.begin(EntityKind::Product, "4").unwrap();

        let counts = ledger.count_by_status(EntityKind::Product).unwrap();
        assert_eq!(counts.get(&JobStatus::Done), Some(&1));
        assert_eq!(counts.get(&JobStatus::Failed), Some(&2));
        assert_eq!(counts.get(&JobStatus::Pending), Some(&1));

        let failed = ledger
            .entries_with_status(EntityKind::Product, JobStatus::Failed)
            .unwrap();
        let ids: Vec<_> = failed.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut ledger = SqliteLedger::new(&path).unwrap();
            ledger.begin(EntityKind::Product, "77").unwrap();
            ledger
                .mark(EntityKind::Product, "77", JobStatus::Done, None)
                .unwrap();
        }

        let ledger = SqliteLedger::new(&path).unwrap();
        assert!(ledger.is_done(EntityKind::Product, "77").unwrap());
    }
}
