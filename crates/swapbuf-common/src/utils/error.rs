//! Error types for Swapbuf.
//!
//! Configuration problems and precondition violations are reported to the
//! caller and leave the registry untouched. I/O and corruption problems on the
//! restore path are data loss for the owning buffer and always propagate.

use crate::types::BufferId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout Swapbuf.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown policy, or a configuration value that cannot be used.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation is not valid for the buffer's current state.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The dump folder or a backing file could not be created or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A backing file is missing or does not hold what was written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal invariant broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the buffer's content could not be brought back.
    #[must_use]
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true for precondition violations.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// The buffer is not in a state that allows the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// No buffer with this id is tracked.
    #[error("buffer {0} is not registered")]
    NotRegistered(BufferId),

    /// A buffer with this id is already tracked.
    #[error("buffer {0} is already registered")]
    AlreadyRegistered(BufferId),

    /// The buffer is locked in memory.
    #[error("buffer {id} is locked ({lock_count} outstanding locks)")]
    Locked {
        /// The buffer.
        id: BufferId,
        /// Number of outstanding locks.
        lock_count: u32,
    },

    /// Unlock requested on a buffer that holds no lock.
    #[error("buffer {0} is not locked")]
    NotLocked(BufferId),
}

/// Backing file problems detected while restoring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing file disappeared.
    #[error("backing file missing: {}", .0.display())]
    MissingBackingFile(PathBuf),

    /// The backing file exists but its content is not what was dumped.
    #[error("backing file corrupted: {}: {reason}", path.display())]
    Corruption {
        /// Backing file path.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// The backing file exists but reading it failed.
    #[error("backing file unreadable: {}: {reason}", path.display())]
    Unreadable {
        /// Backing file path.
        path: PathBuf,
        /// The underlying I/O failure.
        reason: String,
    },
}
