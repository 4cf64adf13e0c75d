//! Worker pool configuration from TOML (`[cluster]` section)
//!
//! ```toml
//! [cluster]
//! workers = 2
//! launch = "process"      # or "inline"
//! max_frame_size = 16777216
//!
//! [cluster.tags]
//! answers = 100
//! exams = 101
//! results = 102
//! command = 103
//! ```

use crate::cluster::DEFAULT_MAX_FRAME_SIZE;
use scorehive_domain::{ChannelTags, PoolSize};
use serde::{Deserialize, Serialize};

/// Where workers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// One `scorehive worker` process per worker rank
    #[default]
    Process,
    /// Worker loops run as tasks inside the coordinator process
    Inline,
}

/// Raw cluster configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClusterConfig {
    /// Number of worker ranks (the pool also holds the coordinator)
    pub workers: u32,
    pub launch: LaunchMode,
    /// Largest cluster frame payload, in bytes; at least `server.max_message_size`
    pub max_frame_size: usize,
    /// Channel tags (uses domain type)
    pub tags: ChannelTags,
}

impl Default for FileClusterConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            launch: LaunchMode::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tags: ChannelTags::default(),
        }
    }
}

impl FileClusterConfig {
    pub fn pool_size(&self) -> PoolSize {
        PoolSize::with_workers(self.workers)
    }
}
