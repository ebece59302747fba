//! Errors that can end a relay run or a single connection's worker.

use thiserror::Error;

/// Fatal errors from running a relay. Per-connection I/O failures are logged
/// and the accept loop continues; only listener setup and the filter chain's
/// own fatal conditions propagate here.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The listening socket could not be bound.
    #[error("failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),
    /// Spawning the attached child process (`-c <command>`) failed.
    #[error("failed to spawn child process {0:?}: {1}")]
    ChildSpawn(Vec<String>, #[source] std::io::Error),
    /// The `-c <command>` value split into zero words.
    #[error("-c requires a non-empty command")]
    EmptyCommand,
    /// A filter reported a fatal, non-recoverable condition.
    #[error("filter error: {0}")]
    Filter(#[from] filters::FilterError),
}
