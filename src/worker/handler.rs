use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::events::EventEmitter;

/// Context handed to a job handler during execution.
///
/// Exposes the two capabilities a handler may need: cooperative
/// cancellation checks and progress reporting.
#[derive(Clone)]
pub struct JobContext {
    job_id: Uuid,
    cancelled: Arc<AtomicBool>,
    emitter: Arc<dyn EventEmitter>,
}

impl JobContext {
    pub(crate) fn new(job_id: Uuid, cancelled: Arc<AtomicBool>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            job_id,
            cancelled,
            emitter,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Whether `cancel` was called for this job. Cancellation is
    /// advisory: a handler that wants to honor it should return
    /// `Err(QueueError::Cancelled)` when this turns true. A handler
    /// that never checks simply runs to its natural outcome.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Report progress (current step out of total) to the observer.
    pub fn emit_progress(&self, current: u32, total: u32) {
        self.emitter.job_progress(self.job_id, current, total);
    }
}

/// A unit of domain work the queue knows nothing about.
///
/// Implementations receive the opaque payload stored at enqueue time
/// plus a [`JobContext`]. Returning `Ok` yields Completed (with an
/// optional output string), `Err(QueueError::Cancelled)` yields
/// Cancelled, any other error yields Failed. Handlers run on the
/// executor's task and must not hold the queue's lock (they never see
/// it).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, payload: Value, ctx: &JobContext) -> Result<Option<String>>;
}

/// Dispatch table mapping a payload type tag to its handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job kind, replacing any previous one.
    pub fn register(mut self, kind: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEmitter;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        async fn execute(&self, payload: Value, _ctx: &JobContext) -> Result<Option<String>> {
            Ok(Some(payload.to_string()))
        }
    }

    #[test]
    fn registry_lookup() {
        let registry = HandlerRegistry::new().register("echo", Arc::new(Echo));
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[tokio::test]
    async fn context_reflects_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = JobContext::new(Uuid::new_v4(), flag.clone(), Arc::new(NoopEmitter));
        assert!(!ctx.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(ctx.is_cancelled());
    }
}
