//! # Engine Error Types
//!
//! The engine joins the two error families below it: domain rule
//! violations (`CoreError`) and storage failures (`DbError`). Both abort
//! the surrounding SQL transaction; the distinction matters to callers
//! because core errors are user-facing ("insufficient stock") while db
//! errors are operational.

use thiserror::Error;

use duka_core::CoreError;
use duka_db::DbError;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A domain rule refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A JSON column (payment breakdown, audit details) failed to encode.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// The request itself is malformed (empty cart, no tenders...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
