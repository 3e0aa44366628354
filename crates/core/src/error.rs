//! Error types for the rolling index
//!
//! Every fallible operation in the workspace returns `IndexResult<T>`.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use chrono::NaiveDate;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors produced by the partition codec, registry and index manager
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector length doesn't match the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimension
        expected: usize,
        /// Length of the provided vector
        got: usize,
    },

    /// Search requested zero results
    #[error("Invalid k: {k} (must be > 0)")]
    InvalidK {
        /// The rejected k
        k: usize,
    },

    /// A persisted partition could not be decoded
    #[error("Corrupt partition {date}: {reason}")]
    CorruptPartition {
        /// Partition date
        date: NaiveDate,
        /// What was wrong with it
        reason: String,
    },

    /// Disk I/O failed
    #[error("Storage I/O error on {}: {source}", path.display())]
    StorageIo {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Metadata could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target partition was evicted while the operation waited for it
    #[error("Partition {date} was evicted")]
    PartitionEvicted {
        /// Partition date
        date: NaiveDate,
    },
}

impl IndexError {
    /// Wrap an `io::Error` with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Build a `CorruptPartition` error
    pub fn corrupt(date: NaiveDate, reason: impl Into<String>) -> Self {
        IndexError::CorruptPartition {
            date,
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by invalid caller input
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            IndexError::DimensionMismatch { .. } | IndexError::InvalidK { .. }
        )
    }

    /// Check if this error indicates an unreadable partition on disk
    pub fn is_corruption(&self) -> bool {
        matches!(self, IndexError::CorruptPartition { .. })
    }
}
