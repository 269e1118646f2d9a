/// Ledger state definitions for tracking scrape progress
///
/// This module defines the states an entity moves through in the job ledger.
use std::fmt;

/// Represents the current ledger state of a category or product
///
/// Lifecycle: `Pending` when an attempt starts, `Done` once its result is
/// durably written, `Failed` when the attempt ends without a usable result.
/// Only `Done` entities are skipped on the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatus {
    /// An attempt has started but has not finished
    Pending,

    /// The entity's result was written to durable storage
    Done,

    /// The last attempt failed; the next run will retry it
    Failed,
}

impl JobStatus {
    /// Returns true if the entity needs no further work
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::Done, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
