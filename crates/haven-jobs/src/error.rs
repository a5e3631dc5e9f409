//! # Job Error Types
//!
//! Error types for the jobs layer. Channel send failures are deliberately
//! NOT in here: a failed send is a queue-state outcome (retry/failed), not
//! an error that aborts a drain run.

use thiserror::Error;

use haven_core::CoreError;
use haven_db::DbError;

/// Errors that abort a job run.
#[derive(Debug, Error)]
pub enum JobsError {
    /// Database access failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A domain rule rejected the operation.
    #[error("domain error: {0}")]
    Core(#[from] CoreError),

    /// Payload (de)serialization failed.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A job was invoked with invalid parameters.
    #[error("invalid job parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for job operations.
pub type JobsResult<T> = Result<T, JobsError>;
