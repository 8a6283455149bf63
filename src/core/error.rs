//! Defines the custom error type for the `core` module.

use std::path::{PathBuf, StripPrefixError};
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// This enum encapsulates all possible errors that can occur during
/// scanning, preview computation, and the destructive apply step.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// The supplied root path does not exist or is not a directory.
    #[error("Invalid root path: {0}")]
    InvalidRoot(PathBuf),

    /// A request failed schema-level validation before any work was done.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A banned rule containing a wildcard could not be compiled.
    #[error("Invalid banned rule pattern: {0}")]
    RulePattern(#[from] globset::Error),

    /// Represents a failure to strip a path prefix when building backup paths.
    #[error("Failed to strip prefix from path: {0}")]
    PathStrip(#[from] StripPrefixError),

    /// Represents an error that occurred when a Tokio task was joined.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A response violated its own internal consistency contract.
    #[error("Response failed validation: {0}")]
    Contract(String),
}
