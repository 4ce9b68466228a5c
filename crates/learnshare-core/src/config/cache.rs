//! Tree read cache configuration.

use serde::{Deserialize, Serialize};

/// In-memory cache for assembled category trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeCacheConfig {
    /// Whether assembled trees are cached between mutations.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of cached trees.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Time-to-live for a cached tree in seconds.
    #[serde(default = "default_ttl")]
    pub time_to_live_seconds: u64,
}

impl Default for TreeCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_capacity: default_max_capacity(),
            time_to_live_seconds: default_ttl(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    1_000
}

fn default_ttl() -> u64 {
    300
}
