//! Error types for the offer pipeline.
//!
//! A failed match is not an error: the matcher returns `None` and the caller
//! waits for the next offer. Errors are reserved for requests the core cannot
//! act on at all.

use thiserror::Error;

/// Result type for pipeline operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors surfaced by the offer pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The run spec kind is not one the pipeline knows how to launch.
    ///
    /// Unreachable for specs built through this crate's types; kept for
    /// callers that ingest foreign spec encodings. Fatal to the request.
    #[error("unsupported run spec kind: {kind}")]
    UnsupportedRunSpec { kind: String },

    /// The task builder was invoked after a successful match but could not
    /// produce a payload. The caller must not apply a partial operation.
    #[error("task builder failure: {reason}")]
    BuilderFailure { reason: String },

    /// A data-model invariant was violated. The caller's policy decides
    /// whether to mark the instance in error.
    #[error("invariant violation: {message}")]
    Invariant { message: String },
}
