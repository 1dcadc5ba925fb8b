//! Federated job-submission engine.
//!
//! Clients submit abstract job requests (command arguments plus tag-based
//! placement criteria); the engine resolves each request to a concrete
//! cluster/command pair, dispatches execution, and tracks the job's
//! lifecycle through to a terminal state. Instances form a fleet; a load
//! balancer places new submissions on the least-loaded member.
//!
//! Transport, authentication, durable persistence, and log archival are
//! external collaborators behind the [`catalog::CatalogSource`],
//! [`job::JobStore`], [`scheduler::JobCountSource`], and
//! [`worker::ExecutionBackend`] seams.

pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod scheduler;
pub mod worker;

pub use error::{FedjobError, Result};
pub use orchestrator::Orchestrator;
