//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod cluster;
mod logging;
mod server;

pub use cluster::{FileClusterConfig, LaunchMode};
pub use logging::FileLoggingConfig;
pub use server::FileServerConfig;

use scorehive_domain::{DomainError, ScoreWeights};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest `server.max_message_size` that can hold a framed request
pub const MIN_MESSAGE_SIZE: usize = 16;

/// Configuration validation errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigValidationError {
    #[error("server.port cannot be 0")]
    InvalidPort,

    #[error("server.backlog must be at least 1")]
    InvalidBacklog,

    #[error("server.max_message_size must be at least 16 bytes, got {0}")]
    MessageSizeTooSmall(usize),

    #[error("cluster.workers must be at least 1")]
    NoWorkers,

    #[error("cluster.max_frame_size cannot be 0")]
    InvalidFrameSize,

    #[error(
        "cluster.max_frame_size ({frame}) is smaller than server.max_message_size ({message})"
    )]
    FrameSmallerThanMessage { frame: usize, message: usize },

    #[error("cluster.tags: tag {0} is used by more than one channel")]
    DuplicateTag(u8),

    #[error("scoring weights must be finite numbers")]
    NonFiniteWeights,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Client protocol server settings
    pub server: FileServerConfig,
    /// Worker pool settings
    pub cluster: FileClusterConfig,
    /// Score weights (uses domain type)
    pub scoring: ScoreWeights,
    /// Review log settings
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }
        if self.server.backlog == 0 {
            return Err(ConfigValidationError::InvalidBacklog);
        }
        if self.server.max_message_size < MIN_MESSAGE_SIZE {
            return Err(ConfigValidationError::MessageSizeTooSmall(
                self.server.max_message_size,
            ));
        }

        if self.cluster.workers == 0 {
            return Err(ConfigValidationError::NoWorkers);
        }
        if self.cluster.max_frame_size == 0 {
            return Err(ConfigValidationError::InvalidFrameSize);
        }
        if self.cluster.max_frame_size < self.server.max_message_size {
            return Err(ConfigValidationError::FrameSmallerThanMessage {
                frame: self.cluster.max_frame_size,
                message: self.server.max_message_size,
            });
        }
        if let Err(DomainError::DuplicateChannelTag(tag)) = self.cluster.tags.validate() {
            return Err(ConfigValidationError::DuplicateTag(tag));
        }

        if !self.scoring.is_finite() {
            return Err(ConfigValidationError::NonFiniteWeights);
        }

        Ok(())
    }
}
