//! Error types for the cluster adapters

use scorehive_domain::Rank;
use thiserror::Error;

/// Result type alias for cluster setup
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors raised while bringing the worker pool up or down
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to spawn worker {rank}: {source}")]
    Spawn {
        rank: Rank,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {rank} did not announce its port: {message}")]
    Announcement { rank: Rank, message: String },

    #[error("Failed to connect to worker {rank}: {source}")]
    Connect {
        rank: Rank,
        #[source]
        source: std::io::Error,
    },

    #[error("Cluster I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot locate the scorehive executable: {0}")]
    Executable(String),
}
