//! # Error Types
//!
//! One error enum per subsystem boundary. Inside the world engine these errors
//! are almost always absorbed where they occur: a failed storage read becomes
//! "not found", a failed write leaves the chunk dirty, and a failed worker task
//! is rerun synchronously. Only configuration loading hands its error to the
//! embedding application.

use thiserror::Error;

/// Failure reported by a [`KeyValueStore`](crate::engine_state::voxels::persistence::KeyValueStore)
/// backend or while decoding one of its records.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend hit an operating system I/O error.
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        /// Record key (or root directory) involved in the failed operation.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A chunk record exists but does not have the size of a chunk buffer.
    #[error("chunk record `{key}` is corrupt: expected {expected} bytes, found {found}")]
    CorruptRecord {
        /// Record key.
        key: String,
        /// Expected number of bytes (`chunk_size² · chunk_height`).
        expected: usize,
        /// Number of bytes actually stored.
        found: usize,
    },

    /// The metadata record could not be encoded or decoded.
    #[error("world metadata is invalid: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The backend refused the request (for example a test double switched off).
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Failure while loading or validating a [`WorldConfig`](crate::engine_state::config::WorldConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for `WorldConfig`.
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value outside its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },
}

/// Failure of a task submitted to the [`TaskManager`](crate::engine_state::task_management::TaskManager).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked while running on a worker thread.
    #[error("worker task panicked: {0}")]
    Panicked(String),

    /// The worker thread is gone and can no longer accept or answer tasks.
    #[error("worker {0} disconnected")]
    Disconnected(usize),
}
