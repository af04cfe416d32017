//! # quenda
//!
//! Durable, priority-ordered background job queue for single-process
//! tokio applications.
//!
//! Jobs are persisted (SQLite or in-memory), dispatched one at a time in
//! High > Normal > Low priority order with FIFO fairness inside each
//! level, throttled by an optional cooldown and consecutive-dispatch
//! limit, and recovered automatically after a crash. Handlers get a
//! context for cooperative cancellation and progress reporting;
//! observers receive lifecycle events through a pluggable emitter.
//!
//! 1. Implement [`JobHandler`] for each job kind and collect them in a
//!    [`HandlerRegistry`]
//! 2. Open a [`QueueManager`] with a [`QueueConfig`]
//! 3. Call [`QueueManager::start`] and enqueue work

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use events::{EventEmitter, LogEmitter, NoopEmitter};
pub use manager::QueueManager;
pub use scheduler::{JobRecord, JobStatus, Priority};
pub use store::{JobStore, MemoryStore, SqliteStore};
pub use worker::{HandlerRegistry, JobContext, JobHandler};
