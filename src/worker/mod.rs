//! Process execution: the collaborator seam the orchestrator dispatches
//! through, and a local-process implementation of it.
//!
//! # Execution flow
//!
//! 1. The orchestrator resolves a job to a command and calls
//!    [`ExecutionBackend::dispatch`] with the command's argv prefix plus the
//!    job's arguments
//! 2. A spawned task awaits [`ExecutionBackend::wait`] and records the
//!    terminal status from the exit code
//! 3. Kill and timeout paths call [`ExecutionBackend::terminate`]; the
//!    status change is recorded before the process is reaped

pub mod executor;

pub use executor::{ExecutionBackend, ExecutionOutcome, ProcessExecutor};
