//! Category hierarchy configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DeletePolicy;

/// Which storage engine backs the category hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PostgreSQL closure table.
    Postgres,
    /// Process-local snapshot, lost on exit.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Settings for the category closure-table engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Storage engine.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// How long a mutation waits for the hierarchy lock before failing
    /// with a retryable conflict.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Policy used when a delete request does not name one.
    #[serde(default)]
    pub default_delete_policy: DeletePolicy,
    /// Run the full integrity check inside every mutation before commit.
    #[serde(default)]
    pub verify_invariants: bool,
    /// Number of levels shown by the upload-wizard category picker.
    #[serde(default = "default_picker_depth")]
    pub picker_depth: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            lock_timeout_ms: default_lock_timeout(),
            default_delete_policy: DeletePolicy::default(),
            verify_invariants: false,
            picker_depth: default_picker_depth(),
        }
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Postgres
}

fn default_lock_timeout() -> u64 {
    5_000
}

fn default_picker_depth() -> u32 {
    2
}
