pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::scheduler::{JobRecord, JobStatus, Priority};

/// Durable table of job records; the only component that touches
/// persistent storage.
///
/// Both backends expose the identical contract. Every operation is
/// atomic per record: a concurrent reader never observes a torn write.
/// Writes are not retried here; a failed write surfaces to the caller
/// and the queue re-reads the store before its next scheduling decision.
pub trait JobStore: Send {
    fn insert(&mut self, record: &JobRecord) -> Result<()>;

    fn get(&self, id: Uuid) -> Result<Option<JobRecord>>;

    /// Apply a status transition, recording the result fields and
    /// bumping `updated_at`.
    fn update_status(
        &mut self,
        id: Uuid,
        status: JobStatus,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Queued -> Running transition: sets the status, bumps `updated_at`
    /// and increments `attempt_count`. Returns the new attempt count.
    fn mark_running(&mut self, id: Uuid) -> Result<u32>;

    /// Change the priority of a job. Status checks happen at the façade;
    /// the store just writes.
    fn update_priority(&mut self, id: Uuid, priority: Priority) -> Result<()>;

    fn scan_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>>;

    fn scan_all(&self) -> Result<Vec<JobRecord>>;

    /// Flip every Running record back to Queued. Only crash recovery
    /// calls this, before the scheduler loop starts polling. Attempt
    /// counts are left alone: they already reflect the interrupted run.
    fn requeue_interrupted(&mut self) -> Result<u32>;

    /// Delete terminal-status records whose `updated_at` is older than
    /// `cutoff`. Queued and Running records are never touched. Returns
    /// the number of deleted records.
    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u32>;
}
