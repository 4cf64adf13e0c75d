//! Infrastructure layer for scorehive
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod cluster;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use cluster::{
    ClusterError, LocalCluster, LocalEndpoint, TcpClusterTransport, WorkerLaunch,
};
pub use config::{
    ConfigLoader, ConfigValidationError, FileClusterConfig, FileConfig, FileLoggingConfig,
    FileServerConfig, LaunchMode,
};
pub use logging::JsonlReviewLogger;
