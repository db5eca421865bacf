//! Error types for the sample store.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sample store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// No container archives in the data directory
    #[error("No tar files found in data directory: {0}")]
    NoContainers(PathBuf),

    /// Container header is malformed
    #[error("Corrupt container {path}: {reason}")]
    CorruptContainer { path: PathBuf, reason: String },

    /// File is truncated
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Temporal index came out empty after filtering
    #[error("No dated samples found with channels [{0}]")]
    NoDatedSamples(String),

    /// Ordinal beyond the temporal index
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Lookup key is not a recognised timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Channel decoder has no handler for this postfix
    #[error("Unknown data type for file: {0}")]
    UnsupportedFormat(String),

    /// Channel payload could not be decoded
    #[error("Invalid channel data in {name}: {reason}")]
    InvalidChannel { name: String, reason: String },

    /// Channels of one sample disagree on spatial shape
    #[error("Shape mismatch for channel {channel}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        channel: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Channels of one sample disagree on element type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Internal consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Cache artifact could not be read or written
    #[error("Cache artifact {path}: {reason}")]
    Cache { path: PathBuf, reason: String },

    /// Manifest could not be parsed
    #[error("Manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// Store configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a corrupt container error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptContainer {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid channel error.
    pub fn invalid_channel(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidChannel {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a cache artifact error.
    pub fn cache(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Cache {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an `open()` failure, keeping the path for missing files.
    pub fn from_open(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}

/// Result type alias for sample store operations.
pub type Result<T> = std::result::Result<T, Error>;
