use thiserror::Error;
use uuid::Uuid;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum FedjobError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No cluster/command pair satisfies the request")]
    NoMatchFound,

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FedjobError>;
