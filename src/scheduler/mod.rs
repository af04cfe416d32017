pub mod index;
pub mod job;

pub use index::QueueIndex;
pub use job::{JobRecord, JobStatus, Priority};
