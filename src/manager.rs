use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::events::EventEmitter;
use crate::scheduler::{JobRecord, JobStatus, Priority, QueueIndex};
use crate::store::{JobStore, MemoryStore, SqliteStore};
use crate::worker::{HandlerRegistry, JobExecutor};

/// The one job currently holding active-execution status, plus the
/// cooperative cancellation flag its handler observes.
struct ActiveJob {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
}

/// Shared mutable state. Every read-then-write of the store or the
/// index happens under this single lock, so "pick next job" and "apply
/// a transition" are each atomic with respect to all other operations.
/// Handler execution itself runs with the lock released.
struct Inner {
    store: Box<dyn JobStore>,
    index: QueueIndex,
    active: Option<ActiveJob>,
}

/// The queue façade: enqueue, cancel, reorder, pause/resume, list,
/// prune. Owns the store and the in-memory index and runs the
/// scheduler loop as a background task.
///
/// # Example
///
/// ```ignore
/// let registry = HandlerRegistry::new().register("caption", Arc::new(CaptionHandler));
/// let manager = Arc::new(QueueManager::open(
///     QueueConfig::default(),
///     registry,
///     Arc::new(LogEmitter),
/// )?);
/// manager.start();
/// let id = manager.enqueue("caption", payload, Priority::Normal).await?;
/// ```
pub struct QueueManager {
    config: QueueConfig,
    inner: Mutex<Inner>,
    executor: JobExecutor,
    emitter: Arc<dyn EventEmitter>,
    paused: AtomicBool,
    wake: Notify,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl QueueManager {
    /// Open the store named by the config (SQLite file, or in-memory
    /// when no path is set), run crash recovery, and rebuild the index.
    ///
    /// Recovery happens before the scheduler loop ever polls: any
    /// record left Running by an unclean shutdown goes back to Queued
    /// at its original fairness position.
    pub fn open(
        config: QueueConfig,
        registry: HandlerRegistry,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self> {
        let store: Box<dyn JobStore> = match &config.store_path {
            Some(path) => Box::new(SqliteStore::open(Some(path))?),
            None => Box::new(MemoryStore::new()),
        };
        Self::with_store(store, config, registry, emitter)
    }

    /// Same as [`open`](Self::open) but with a caller-supplied store.
    pub fn with_store(
        mut store: Box<dyn JobStore>,
        config: QueueConfig,
        registry: HandlerRegistry,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self> {
        let requeued = store.requeue_interrupted()?;
        if requeued > 0 {
            tracing::info!(requeued, "Requeued jobs interrupted by a previous shutdown");
        }

        let mut index = QueueIndex::new();
        index.rebuild(&store.scan_by_status(JobStatus::Queued)?);

        Ok(Self {
            executor: JobExecutor::new(registry, emitter.clone()),
            config,
            inner: Mutex::new(Inner {
                store,
                index,
                active: None,
            }),
            emitter,
            paused: AtomicBool::new(false),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn the scheduler loop. Calling this more than once is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_loop().await;
        });
    }

    /// Stop the scheduler loop. An in-flight job finishes and its
    /// transition is written; nothing new dispatches afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); lets callers
    /// tie the queue to process-level signal handling.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Persist a new job and make it eligible for dispatch.
    ///
    /// The payload is opaque; `kind` selects the handler at execution
    /// time. An unknown kind is not an enqueue error; it surfaces as a
    /// Failed outcome when the job dispatches.
    pub async fn enqueue(
        &self,
        kind: impl Into<String>,
        payload: Value,
        priority: Priority,
    ) -> Result<Uuid> {
        let record = JobRecord::new(kind, payload, priority);
        let id = record.id;
        {
            let mut inner = self.inner.lock().await;
            inner.store.insert(&record)?;
            inner.index.insert(&record);
        }
        tracing::debug!(job_id = %id, priority = %record.priority, kind = %record.kind, "Job enqueued");
        self.wake.notify_one();
        Ok(id)
    }

    /// Cancel a job.
    ///
    /// A Queued job is cancelled immediately. For the Running job this
    /// only raises the cooperative flag; the transition happens when
    /// (and only if) the handler returns a cancellation error.
    /// Cancelling an already-terminal job is a no-op; an unknown id is
    /// an error.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(active) = &inner.active {
            if active.id == id {
                active.cancelled.store(true, Ordering::Relaxed);
                tracing::info!(job_id = %id, "Cancellation requested for running job");
                return Ok(());
            }
        }

        let job = inner.store.get(id)?.ok_or(QueueError::JobNotFound(id))?;
        match job.status {
            JobStatus::Queued => {
                inner
                    .store
                    .update_status(id, JobStatus::Cancelled, None, None)?;
                inner.index.remove(id);
                self.emitter.job_cancelled(id);
                tracing::info!(job_id = %id, "Queued job cancelled");
                Ok(())
            }
            // Terminal already, or a Running record with no live
            // handler (possible only if a status write failed earlier);
            // nothing to do either way.
            _ => Ok(()),
        }
    }

    /// Change the priority of a Queued job. `created_at` is preserved,
    /// so the job keeps its fairness position among its new peers.
    pub async fn reorder(&self, id: Uuid, new_priority: Priority) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.store.get(id)?.ok_or(QueueError::JobNotFound(id))?;
        if job.status != JobStatus::Queued {
            return Err(QueueError::InvalidState {
                id,
                status: job.status,
                expected: JobStatus::Queued,
            });
        }
        inner.store.update_priority(id, new_priority)?;
        inner.index.reorder(id, new_priority);
        drop(inner);
        tracing::debug!(job_id = %id, priority = %new_priority, "Job reordered");
        self.wake.notify_one();
        Ok(())
    }

    /// Stop dispatching new jobs. An in-flight job finishes normally.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
        tracing::info!("Queue paused");
    }

    /// Re-enable dispatch on the next scheduling decision.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        tracing::info!("Queue resumed");
        self.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<JobRecord>> {
        let inner = self.inner.lock().await;
        inner.store.get(id)
    }

    /// Cloned snapshot of every job record, oldest first.
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        let inner = self.inner.lock().await;
        inner.store.scan_all()
    }

    /// Delete terminal-status jobs whose last transition is older than
    /// `age`. Queued and Running jobs are never touched. Returns the
    /// number of deleted records.
    pub async fn prune(&self, age: Duration) -> Result<u32> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| QueueError::Internal(format!("prune age out of range: {e}")))?;
        let cutoff = Utc::now() - age;
        let mut inner = self.inner.lock().await;
        let removed = inner.store.delete_older_than(cutoff)?;
        if removed > 0 {
            tracing::info!(removed, "Pruned old jobs");
        }
        Ok(removed)
    }

    /// Single-threaded decision loop: woken by the poll interval, an
    /// enqueue/resume event, or shutdown; dispatches at most one job
    /// per wake and runs it to completion before the next decision.
    async fn run_loop(&self) {
        let mut consecutive: u32 = 0;
        let mut last_finished: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            if self.is_paused() {
                consecutive = 0;
                continue;
            }

            if self.config.max_consecutive > 0 && consecutive >= self.config.max_consecutive {
                tracing::info!(
                    limit = self.config.max_consecutive,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    "Consecutive dispatch limit reached, forcing cooldown"
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.cooldown) => {}
                }
                consecutive = 0;
                continue;
            }

            if let Some(finished) = last_finished {
                if finished.elapsed() < self.config.cooldown {
                    continue;
                }
            }

            match self.dispatch_next().await {
                Ok(Some(_)) => {
                    consecutive += 1;
                    last_finished = Some(Instant::now());
                    // Drain the backlog without waiting out the poll
                    // interval; throttle checks still apply next pass.
                    self.wake.notify_one();
                }
                Ok(None) => {
                    consecutive = 0;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dispatch skipped after store error, retrying next poll");
                }
            }
        }

        tracing::info!("Scheduler loop stopped");
    }

    /// Pick, mark and run the next eligible job. Returns the job id, or
    /// `None` when nothing was eligible.
    async fn dispatch_next(&self) -> Result<Option<Uuid>> {
        let (record, cancelled) = {
            let mut inner = self.inner.lock().await;
            if inner.active.is_some() {
                return Ok(None);
            }
            let Some(id) = inner.index.peek_next() else {
                return Ok(None);
            };

            // The store is authoritative; drop stale index entries.
            let Some(mut record) = inner.store.get(id)? else {
                inner.index.remove(id);
                return Ok(None);
            };
            if record.status != JobStatus::Queued {
                inner.index.remove(id);
                return Ok(None);
            }

            record.attempt_count = inner.store.mark_running(id)?;
            record.status = JobStatus::Running;
            inner.index.remove(id);

            let cancelled = Arc::new(AtomicBool::new(false));
            inner.active = Some(ActiveJob {
                id,
                cancelled: cancelled.clone(),
            });
            (record, cancelled)
        };

        // The transition is durable; now it may become visible.
        self.emitter.job_started(record.id);

        // Handler runs with the lock released so enqueue/cancel/list
        // keep working during long jobs.
        let result = self.executor.execute(&record, cancelled).await;

        {
            let mut inner = self.inner.lock().await;
            inner.active = None;
            inner.store.update_status(
                result.job_id,
                result.status,
                result.output.as_deref(),
                result.error.as_deref(),
            )?;
        }

        match result.status {
            JobStatus::Completed => self
                .emitter
                .job_completed(result.job_id, result.output.as_deref()),
            JobStatus::Failed => self
                .emitter
                .job_failed(result.job_id, result.error.as_deref().unwrap_or("unknown error")),
            JobStatus::Cancelled => self.emitter.job_cancelled(result.job_id),
            _ => {}
        }

        Ok(Some(record.id))
    }
}
