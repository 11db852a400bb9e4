//! Tagged application error kinds.
//!
//! The core never uses exceptions for control flow: handlers return typed
//! results, and only the HTTP boundary (out of core) converts an `AppError`
//! into a status code. The mapping is documented per-variant below so an
//! eventual HTTP layer can implement it mechanically.

use thiserror::Error;

/// A tagged application error.
///
/// Variant names match the error kinds in the specification's error-handling
/// design: each is surfaced at a specific HTTP status by an outer boundary
/// that this crate does not implement.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input (e.g. an invalid rate string). Recoverable; 400-class.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced asset or resource does not exist. 404-class.
    #[error("not found: {0}")]
    ResourceNotFound(String),

    /// Conflicting state (e.g. starting a recording while one is active). 409-class.
    #[error("conflict: {0}")]
    ResourceConflict(String),

    /// A domain rule was violated. 409-class.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// Uploader credential problem. 401-class.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Missing or invalid settings. Fatal at startup. 500-class.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Recorder/capture device not ready. Transient. 503-class.
    #[error("device not ready: {0}")]
    Device(String),

    /// Recorder returned an unexpected response. 409-class, logged.
    #[error("recording error: {0}")]
    Recording(String),

    /// Unclassified internal error. 500-class.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The conventional HTTP status an outer boundary should map this to.
    /// Kept here (rather than in the HTTP layer) so the mapping can't drift.
    pub fn status_hint(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Authentication(_) => 401,
            AppError::ResourceNotFound(_) => 404,
            AppError::ResourceConflict(_) | AppError::RuleViolation(_) | AppError::Recording(_) => 409,
            AppError::Device(_) => 503,
            AppError::Configuration(_) | AppError::Internal(_) => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
