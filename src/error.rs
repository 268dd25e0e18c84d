//! Error types for the Quiver library.
//!
//! Every fallible operation returns [`Result`], whose error type is
//! [`QuiverError`]. The variants follow the repository access taxonomy:
//!
//! - [`QuiverError::Configuration`]: the repository layout is missing or
//!   ambiguous. Fatal, retrying will not help.
//! - [`QuiverError::OutOfRange`]: the caller passed an identifier outside the
//!   valid document range.
//! - [`QuiverError::Storage`]: an underlying read failed. The original message
//!   is kept verbatim.
//! - [`QuiverError::Retrieval`]: the ranking engine failed to execute a query.
//! - [`QuiverError::SnippetUnavailable`]: snippets were requested but the
//!   repository does not store document text.
//! - [`QuiverError::Corrupt`]: an on-disk structure violates its own
//!   invariants (for example a vocabulary that disagrees with the index
//!   statistics).
//!
//! # Examples
//!
//! ```
//! use quiver::error::{QuiverError, Result};
//!
//! fn lookup(id: u64) -> Result<()> {
//!     Err(QuiverError::OutOfRange { id, base: 1, maximum: 4 })
//! }
//!
//! match lookup(9) {
//!     Err(QuiverError::OutOfRange { .. }) => {}
//!     _ => unreachable!(),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quiver operations.
#[derive(Error, Debug)]
pub enum QuiverError {
    /// Bad or ambiguous repository layout (no index, several indexes,
    /// unreadable manifest).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An internal document identifier outside `[base, maximum)`.
    #[error("Internal document identifier {id} is out of bounds [{base}, {maximum})")]
    OutOfRange { id: u64, base: u64, maximum: u64 },

    /// Reading from the collection or index store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The ranking engine failed to evaluate a query.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Snippets were requested but no stored document text is available.
    #[error("Snippets unavailable: {0}")]
    SnippetUnavailable(String),

    /// On-disk data contradicts itself; the index is damaged.
    #[error("Corrupt index: {0}")]
    Corrupt(String),

    /// A caller-supplied argument was rejected before any work was done.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The repository is not in a state that permits the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Query text could not be parsed.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary (bincode) serialization errors.
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Result type alias for operations that may fail with [`QuiverError`].
pub type Result<T> = std::result::Result<T, QuiverError>;

impl QuiverError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        QuiverError::Configuration(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        QuiverError::Storage(msg.into())
    }

    /// Create a new retrieval error.
    pub fn retrieval<S: Into<String>>(msg: S) -> Self {
        QuiverError::Retrieval(msg.into())
    }

    /// Create a new snippet-unavailable error.
    pub fn snippet_unavailable<S: Into<String>>(msg: S) -> Self {
        QuiverError::SnippetUnavailable(msg.into())
    }

    /// Create a new corruption error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        QuiverError::Corrupt(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QuiverError::InvalidArgument(msg.into())
    }

    /// Create a new invalid state error.
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        QuiverError::InvalidState(msg.into())
    }

    /// Create a new query syntax error.
    pub fn query_syntax<S: Into<String>>(msg: S) -> Self {
        QuiverError::QuerySyntax(msg.into())
    }

    /// Whether retrying the same call can never succeed.
    ///
    /// Configuration and corruption errors describe the repository itself,
    /// so callers should surface them instead of looping.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QuiverError::Configuration(_) | QuiverError::Corrupt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QuiverError::storage("metadata lookup failed");
        assert_eq!(error.to_string(), "Storage error: metadata lookup failed");

        let error = QuiverError::configuration("no index");
        assert_eq!(error.to_string(), "Configuration error: no index");

        let error = QuiverError::OutOfRange {
            id: 7,
            base: 1,
            maximum: 4,
        };
        assert_eq!(
            error.to_string(),
            "Internal document identifier 7 is out of bounds [1, 4)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let quiver_error = QuiverError::from(io_error);

        match quiver_error {
            QuiverError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(QuiverError::corrupt("df is zero").is_fatal());
        assert!(QuiverError::configuration("two indexes").is_fatal());
        assert!(!QuiverError::retrieval("parse failure").is_fatal());
        assert!(!QuiverError::snippet_unavailable("no text").is_fatal());
    }
}
