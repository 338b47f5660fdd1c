pub mod executor;
pub mod queue;
pub mod traits;
pub mod types;

pub use executor::{ExecutorConfig, JobExecutor};
pub use queue::InMemoryJobQueue;
pub use traits::JobQueue;
pub use traits::{Job, JobContext, JobHandler, JobResult};
pub use types::{JobId, JobPriority, JobState, JobStatus, QueuedJob, SerializableJob};