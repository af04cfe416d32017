pub mod executor;
pub mod handler;

pub use executor::{ExecutionResult, JobExecutor};
pub use handler::{HandlerRegistry, JobContext, JobHandler};
