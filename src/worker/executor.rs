use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::QueueError;
use crate::events::EventEmitter;
use crate::scheduler::{JobRecord, JobStatus};
use crate::worker::handler::{HandlerRegistry, JobContext};

/// Terminal outcome of one handler invocation.
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Runs exactly one handler invocation at a time.
///
/// Resolves the handler for a record's kind, supplies the job context,
/// and maps the handler's outcome to a terminal status. Execution
/// happens on a dedicated task so a panicking handler surfaces as a
/// Failed result instead of tearing down the scheduler loop.
#[derive(Clone)]
pub struct JobExecutor {
    registry: HandlerRegistry,
    emitter: Arc<dyn EventEmitter>,
}

impl JobExecutor {
    pub fn new(registry: HandlerRegistry, emitter: Arc<dyn EventEmitter>) -> Self {
        Self { registry, emitter }
    }

    pub async fn execute(&self, record: &JobRecord, cancelled: Arc<AtomicBool>) -> ExecutionResult {
        let job_id = record.id;
        tracing::info!(job_id = %job_id, kind = %record.kind, attempt = record.attempt_count, "Executing job");

        let Some(handler) = self.registry.get(&record.kind) else {
            let error = QueueError::UnknownKind(record.kind.clone()).to_string();
            tracing::error!(job_id = %job_id, kind = %record.kind, "No handler for job kind");
            return ExecutionResult {
                job_id,
                status: JobStatus::Failed,
                output: None,
                error: Some(error),
            };
        };

        let ctx = JobContext::new(job_id, cancelled, self.emitter.clone());
        let payload = record.payload.clone();
        let handle = tokio::spawn(async move { handler.execute(payload, &ctx).await });

        let (status, output, error) = match handle.await {
            Ok(Ok(output)) => (JobStatus::Completed, output, None),
            Ok(Err(QueueError::Cancelled)) => (JobStatus::Cancelled, None, None),
            Ok(Err(e)) => (JobStatus::Failed, None, Some(e.to_string())),
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "handler panicked".to_string()
                } else {
                    format!("handler task aborted: {join_err}")
                };
                (JobStatus::Failed, None, Some(reason))
            }
        };

        tracing::info!(job_id = %job_id, status = %status, "Job finished");

        ExecutionResult {
            job_id,
            status,
            output,
            error,
        }
    }
}
