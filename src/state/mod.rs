//! State module for tracking scrape progress
//!
//! # Components
//!
//! - `JobStatus`: ledger state of an entity (pending, done, failed)
//! - `EntityKind`: which kind of entity a ledger row describes

mod entity_kind;
mod job_status;

pub use entity_kind::EntityKind;
pub use job_status::JobStatus;
