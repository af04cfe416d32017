use thiserror::Error;

use crate::scheduler::JobStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("Job {id} is {status}, expected {expected}")]
    InvalidState {
        id: uuid::Uuid,
        status: JobStatus,
        expected: JobStatus,
    },

    #[error("No handler registered for job kind: {0}")]
    UnknownKind(String),

    #[error("Job execution failed: {0}")]
    Execution(String),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
