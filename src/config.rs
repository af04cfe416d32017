use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the queue system.
///
/// The defaults give an in-memory (non-durable) store, no cooldown, no
/// consecutive-dispatch limit, and a 3 second poll interval.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Path to the SQLite database file. `None` = in-memory, non-durable.
    pub store_path: Option<PathBuf>,

    /// Minimum idle delay enforced after each job completes before the
    /// next one may dispatch. Zero disables the delay.
    pub cooldown: Duration,

    /// Number of consecutive dispatches allowed before a forced
    /// cooldown-equivalent pause. Zero = unlimited.
    pub max_consecutive: u32,

    /// How often the scheduler loop wakes when idle.
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            cooldown: Duration::ZERO,
            max_consecutive: 0,
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist jobs to a SQLite file at `path` so they survive restarts.
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_max_consecutive(mut self, max: u32) -> Self {
        self.max_consecutive = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
