use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::scheduler::{JobRecord, JobStatus, Priority};
use crate::store::JobStore;

/// Non-durable store backed by a plain map. Jobs vanish on restart, which
/// also means there is nothing to crash-recover.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: HashMap<Uuid, JobRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut JobRecord> {
        self.jobs.get_mut(&id).ok_or(QueueError::JobNotFound(id))
    }
}

impl JobStore for MemoryStore {
    fn insert(&mut self, record: &JobRecord) -> Result<()> {
        self.jobs.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<JobRecord>> {
        Ok(self.jobs.get(&id).cloned())
    }

    fn update_status(
        &mut self,
        id: Uuid,
        status: JobStatus,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let job = self.get_mut(id)?;
        debug_assert!(
            job.status.can_transition_to(status),
            "illegal transition {} -> {status}",
            job.status
        );
        job.status = status;
        job.output = output.map(str::to_owned);
        job.error = error.map(str::to_owned);
        job.updated_at = Utc::now();
        Ok(())
    }

    fn mark_running(&mut self, id: Uuid) -> Result<u32> {
        let job = self.get_mut(id)?;
        job.status = JobStatus::Running;
        job.attempt_count += 1;
        job.updated_at = Utc::now();
        Ok(job.attempt_count)
    }

    fn update_priority(&mut self, id: Uuid, priority: Priority) -> Result<()> {
        let job = self.get_mut(id)?;
        job.priority = priority;
        Ok(())
    }

    fn scan_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        Ok(jobs)
    }

    fn scan_all(&self) -> Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        Ok(jobs)
    }

    fn requeue_interrupted(&mut self) -> Result<u32> {
        let now = Utc::now();
        let mut count = 0;
        for job in self.jobs.values_mut() {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Queued;
                job.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u32> {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        Ok((before - self.jobs.len()) as u32)
    }
}
