//! Error types for blocksync
//!
//! One enum covers every failure taxonomy a worker can hit: configuration,
//! transport, handshake, I/O, and peer-process errors (see spec section on
//! error handling). Each variant carries enough context to produce a useful
//! diagnostic without the caller having to re-derive it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for blocksync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error during device access
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CLI configuration (unparseable flags, missing positionals)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Launching the agent process (locally or over the transport) failed
    #[error("Transport error starting agent for worker {worker}: {message}")]
    Transport { worker: usize, message: String },

    /// A handshake field could not be parsed, or the connection closed early
    #[error("Handshake error (worker {worker}): {message}")]
    Handshake { worker: usize, message: String },

    /// Destination path echoed by the agent does not match what was requested
    #[error("Worker {worker}: destination device mismatch: requested '{requested}', agent reported '{reported}'")]
    DestinationMismatch {
        worker: usize,
        requested: String,
        reported: String,
    },

    /// Block size negotiated by the agent does not match the driver's
    #[error("Worker {worker}: block size mismatch: driver uses {driver}, agent uses {agent}")]
    BlockSizeMismatch {
        worker: usize,
        driver: usize,
        agent: usize,
    },

    /// Source device does not fit in the destination and --createdest was not given
    #[error("Worker {worker}: source size {source_size} does not fit into destination size {dest_size}")]
    DestinationTooSmall {
        worker: usize,
        source_size: u64,
        dest_size: u64,
    },

    /// The remote or local agent process exited with a non-zero status mid-stream
    #[error("Worker {worker}: agent process exited with status {status}")]
    PeerProcess { worker: usize, status: i32 },

    /// Unsupported hash algorithm name
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    /// One worker in the run failed; carries its index for supervisor reporting
    #[error("Worker {worker} aborted: {message}")]
    WorkerFailed { worker: usize, message: String },
}

impl SyncError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transport error for the given worker
    pub fn transport(worker: usize, message: impl Into<String>) -> Self {
        Self::Transport {
            worker,
            message: message.into(),
        }
    }

    /// Create a handshake error for the given worker
    pub fn handshake(worker: usize, message: impl Into<String>) -> Self {
        Self::Handshake {
            worker,
            message: message.into(),
        }
    }

    /// The worker index this error is attributable to, if any
    pub fn worker(&self) -> Option<usize> {
        match self {
            Self::Transport { worker, .. }
            | Self::Handshake { worker, .. }
            | Self::DestinationMismatch { worker, .. }
            | Self::BlockSizeMismatch { worker, .. }
            | Self::DestinationTooSmall { worker, .. }
            | Self::PeerProcess { worker, .. }
            | Self::WorkerFailed { worker, .. } => Some(*worker),
            _ => None,
        }
    }
}

/// Result type alias for blocksync operations
pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| SyncError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = SyncError::io("/dev/sdb", io_err);
        match &err {
            SyncError::Io { path, .. } => assert_eq!(path, &PathBuf::from("/dev/sdb")),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn worker_index_extracted_from_relevant_variants() {
        let err = SyncError::handshake(3, "bad size");
        assert_eq!(err.worker(), Some(3));

        let err = SyncError::config("missing source");
        assert_eq!(err.worker(), None);
    }
}
