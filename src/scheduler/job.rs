use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Priority levels for queued jobs.
///
/// Jobs dispatch in priority order High > Normal > Low; within one level
/// they dispatch FIFO by `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_i32(&self) -> i32 {
        match self {
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn from_i32(val: i32) -> Self {
        match val {
            1 => Priority::High,
            2 => Priority::Normal,
            _ => Priority::Low,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Job lifecycle: Queued -> Running -> Completed/Failed/Cancelled.
///
/// Queued jobs may also go straight to Cancelled, and a Running job found
/// at startup (previous process died mid-execution) goes back to Queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transition (only deletion by prune).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine defines an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Queued, JobStatus::Cancelled) => true,
            (JobStatus::Running, JobStatus::Completed) => true,
            (JobStatus::Running, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Cancelled) => true,
            // Crash recovery only; never caller-triggered.
            (JobStatus::Running, JobStatus::Queued) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted unit of work and its state.
///
/// The payload is opaque to the queue: an arbitrary JSON value plus a
/// `kind` tag that selects which handler executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub priority: Priority,
    pub status: JobStatus,
    /// Incremented on every Queued -> Running transition. A value above 1
    /// means the job was re-run after an interrupted attempt.
    pub attempt_count: u32,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Set at enqueue; never changes. Sole FIFO ordering key within a
    /// priority level, preserved across reorder.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status transition.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(kind: impl Into<String>, payload: Value, priority: Priority) -> Self {
        // Microsecond precision: the durable store keeps timestamps at
        // that resolution, and created_at must round-trip exactly.
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            payload,
            priority,
            status: JobStatus::Queued,
            attempt_count: 0,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
