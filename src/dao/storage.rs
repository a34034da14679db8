use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias for snapshot storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised while reading or writing the room snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The snapshot file exists but could not be read.
    #[error("failed to read snapshot `{path}`")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Writing, syncing or renaming the snapshot failed.
    #[error("failed to write snapshot `{path}`")]
    Write {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The snapshot exists but is not a well-formed room registry.
    #[error("failed to decode snapshot `{path}`")]
    Decode {
        /// File that failed.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The snapshot was written with a layout this build does not understand.
    #[error("snapshot `{path}` has unsupported layout version {version}")]
    UnsupportedVersion {
        /// File that was refused.
        path: PathBuf,
        /// Version found in the file.
        version: u32,
    },
    /// The registry could not be serialized.
    #[error("failed to encode room snapshot")]
    Encode(#[source] serde_json::Error),
}
