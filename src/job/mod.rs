//! Job model: requests, execution records, the lifecycle state machine, and
//! the store that serializes transitions per job.

pub mod execution;
pub mod request;
pub mod store;

pub use execution::{JobExecution, JobStatus};
pub use request::{JobRequest, JobSearchFilter};
pub use store::{InMemoryJobStore, JobStore, TransitionOutcome};
