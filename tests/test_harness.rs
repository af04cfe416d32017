//! Shared helpers for queue integration tests.
//!
//! Provides recording collaborators (handlers and an event emitter),
//! fast configs, and polling assertions.

// Compiled into several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use quenda::{
    EventEmitter, HandlerRegistry, JobContext, JobHandler, JobStatus, QueueConfig, QueueError,
    QueueManager,
};

/// Every notification the queue emitted, in order.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Event {
    Started(Uuid),
    Progress(Uuid, u32, u32),
    Completed(Uuid, Option<String>),
    Failed(Uuid, String),
    Cancelled(Uuid),
}

#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<Event>>,
}

impl RecordingEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn contains(&self, event: &Event) -> bool {
        self.events.lock().unwrap().contains(event)
    }
}

impl EventEmitter for RecordingEmitter {
    fn job_started(&self, id: Uuid) {
        self.events.lock().unwrap().push(Event::Started(id));
    }

    fn job_progress(&self, id: Uuid, current: u32, total: u32) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Progress(id, current, total));
    }

    fn job_completed(&self, id: Uuid, output: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Completed(id, output.map(str::to_owned)));
    }

    fn job_failed(&self, id: Uuid, error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Failed(id, error.to_owned()));
    }

    fn job_cancelled(&self, id: Uuid) {
        self.events.lock().unwrap().push(Event::Cancelled(id));
    }
}

/// Completes immediately, appending the payload's "label" field to a
/// shared log so tests can assert dispatch order.
pub struct RecordingHandler {
    pub log: Arc<Mutex<Vec<String>>>,
    pub executions: Arc<AtomicU32>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>, Arc<AtomicU32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executions = Arc::new(AtomicU32::new(0));
        let handler = Arc::new(Self {
            log: log.clone(),
            executions: executions.clone(),
        });
        (handler, log, executions)
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn execute(&self, payload: Value, _ctx: &JobContext) -> quenda::Result<Option<String>> {
        let label = payload["label"].as_str().unwrap_or("?").to_owned();
        self.log.lock().unwrap().push(label.clone());
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(Some(label))
    }
}

/// Runs in short steps, honoring cancellation between steps and
/// reporting progress.
pub struct SlowHandler {
    pub steps: u32,
    pub step_delay: Duration,
}

#[async_trait]
impl JobHandler for SlowHandler {
    async fn execute(&self, _payload: Value, ctx: &JobContext) -> quenda::Result<Option<String>> {
        for step in 1..=self.steps {
            if ctx.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            tokio::time::sleep(self.step_delay).await;
            ctx.emit_progress(step, self.steps);
        }
        Ok(None)
    }
}

/// Sleeps for a fixed time and completes without ever looking at the
/// cancellation flag.
pub struct StubbornHandler {
    pub delay: Duration,
}

#[async_trait]
impl JobHandler for StubbornHandler {
    async fn execute(&self, _payload: Value, _ctx: &JobContext) -> quenda::Result<Option<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(Some("finished anyway".into()))
    }
}

pub struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
    async fn execute(&self, _payload: Value, _ctx: &JobContext) -> quenda::Result<Option<String>> {
        Err(QueueError::Execution("handler exploded".into()))
    }
}

pub struct PanicHandler;

#[async_trait]
impl JobHandler for PanicHandler {
    async fn execute(&self, _payload: Value, _ctx: &JobContext) -> quenda::Result<Option<String>> {
        panic!("boom");
    }
}

/// Config with a short poll interval so tests stay fast.
pub fn fast_config() -> QueueConfig {
    QueueConfig::new().with_poll_interval(Duration::from_millis(10))
}

/// In-memory manager with the scheduler loop already running.
#[allow(dead_code)]
pub fn started_manager(
    config: QueueConfig,
    registry: HandlerRegistry,
    emitter: Arc<RecordingEmitter>,
) -> Arc<QueueManager> {
    let manager = Arc::new(
        QueueManager::open(config, registry, emitter).expect("manager should open"),
    );
    manager.start();
    manager
}

/// Wait for a condition to become true with timeout.
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration, poll: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll).await;
    }
    false
}

/// Assert a condition eventually becomes true.
pub async fn assert_eventually<F, Fut>(condition: F, timeout: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout, Duration::from_millis(10)).await;
    assert!(result, "{}", message);
}

/// Wait until the job reaches `status` or the timeout expires.
#[allow(dead_code)]
pub async fn wait_for_status(
    manager: &Arc<QueueManager>,
    id: Uuid,
    status: JobStatus,
    timeout: Duration,
) -> bool {
    wait_for(
        || async {
            matches!(
                manager.get(id).await,
                Ok(Some(job)) if job.status == status
            )
        },
        timeout,
        Duration::from_millis(10),
    )
    .await
}
