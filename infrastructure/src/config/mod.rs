//! Configuration file loading for scorehive
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. `SCOREHIVE_*` environment variables
//! 3. Project root: `./scorehive.toml`
//! 4. Global config: `$XDG_CONFIG_HOME/scorehive/config.toml`
//! 5. Default values
//!
//! Command-line flags such as `--port` are applied on top by the binary.

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileClusterConfig, FileConfig, FileLoggingConfig, FileServerConfig,
    LaunchMode, MIN_MESSAGE_SIZE,
};
pub use loader::{ConfigLoader, ENV_PREFIX};
