use uuid::Uuid;

/// Observer for job lifecycle notifications.
///
/// Every call is fire-and-forget: the queue never consumes a return
/// value and keeps working no matter what the implementation does.
/// Durability precedes visibility: a notification is only sent after
/// the corresponding status transition has landed in the store.
pub trait EventEmitter: Send + Sync {
    fn job_started(&self, id: Uuid);
    fn job_progress(&self, id: Uuid, current: u32, total: u32);
    fn job_completed(&self, id: Uuid, output: Option<&str>);
    fn job_failed(&self, id: Uuid, error: &str);
    fn job_cancelled(&self, id: Uuid);
}

/// Default collaborator: swallows every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn job_started(&self, _id: Uuid) {}
    fn job_progress(&self, _id: Uuid, _current: u32, _total: u32) {}
    fn job_completed(&self, _id: Uuid, _output: Option<&str>) {}
    fn job_failed(&self, _id: Uuid, _error: &str) {}
    fn job_cancelled(&self, _id: Uuid) {}
}

/// Logging-only collaborator that forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn job_started(&self, id: Uuid) {
        tracing::info!(job_id = %id, "Job started");
    }

    fn job_progress(&self, id: Uuid, current: u32, total: u32) {
        let progress = if total > 0 {
            current as f64 / total as f64
        } else {
            0.0
        };
        tracing::debug!(job_id = %id, current, total, progress, "Job progress");
    }

    fn job_completed(&self, id: Uuid, output: Option<&str>) {
        tracing::info!(job_id = %id, output = output.unwrap_or(""), "Job completed");
    }

    fn job_failed(&self, id: Uuid, error: &str) {
        tracing::warn!(job_id = %id, error, "Job failed");
    }

    fn job_cancelled(&self, id: Uuid) {
        tracing::info!(job_id = %id, "Job cancelled");
    }
}
