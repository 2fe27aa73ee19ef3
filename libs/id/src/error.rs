//! Error types for ID parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// A run spec path is not absolute.
    #[error("run spec ID must start with '/': '{0}'")]
    NotAbsolute(String),

    /// A path or ID segment contains characters outside the allowed set.
    #[error("invalid segment '{segment}' in '{id}'")]
    InvalidSegment { id: String, segment: String },

    /// The ID is missing a required separator.
    #[error("ID missing separator '{separator}': '{id}'")]
    MissingSeparator { id: String, separator: char },

    /// The instance marker (`instance-`) is missing or misplaced.
    #[error("ID missing 'instance-' marker: '{0}'")]
    MissingInstanceMarker(String),

    /// The ULID portion of the ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The ID format is invalid.
    #[error("invalid ID format: {message}")]
    InvalidFormat { message: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }
}
