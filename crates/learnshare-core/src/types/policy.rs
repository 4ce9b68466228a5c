//! Delete policies for category nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What happens to a category's subtree when the category is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Refuse to delete a category that still has children or documents.
    #[default]
    BlockIfNonempty,
    /// Soft-delete the category together with its whole subtree.
    Cascade,
    /// Re-attach each direct child to the deleted category's parent
    /// (or make it a root), then delete the now-empty category.
    PromoteChildren,
}

impl DeletePolicy {
    /// Return the policy as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockIfNonempty => "block_if_nonempty",
            Self::Cascade => "cascade",
            Self::PromoteChildren => "promote_children",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "block_if_nonempty" | "block" => Ok(Self::BlockIfNonempty),
            "cascade" => Ok(Self::Cascade),
            "promote_children" | "promote" => Ok(Self::PromoteChildren),
            _ => Err(AppError::validation(format!(
                "Invalid delete policy: '{s}'. Expected one of: block_if_nonempty, cascade, promote_children"
            ))),
        }
    }
}
