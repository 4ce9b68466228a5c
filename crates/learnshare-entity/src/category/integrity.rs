//! Closure index integrity report.

use serde::{Deserialize, Serialize};
use std::fmt;

use learnshare_core::types::CategoryId;

/// A single broken invariant found in the closure index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// A live category has no `(n, n, 0)` row.
    MissingSelfEdge { category_id: CategoryId },
    /// A row has level 0 between different categories, or a self row has a
    /// non-zero level.
    BadReflexiveEdge {
        ancestor_id: CategoryId,
        descendant_id: CategoryId,
        level: i32,
    },
    /// A row references a category that is unknown or soft-deleted.
    DanglingEdge {
        ancestor_id: CategoryId,
        descendant_id: CategoryId,
    },
    /// A category has more than one level-1 parent.
    MultipleParents {
        category_id: CategoryId,
        parents: Vec<CategoryId>,
    },
    /// A category's ancestor levels are not exactly `1..=depth`.
    LevelGap {
        category_id: CategoryId,
        levels: Vec<i32>,
    },
    /// The rows differ from the transitive closure of the level-1 rows.
    NotTransitive {
        category_id: CategoryId,
        expected: Vec<(CategoryId, i32)>,
        actual: Vec<(CategoryId, i32)>,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSelfEdge { category_id } => {
                write!(f, "category {category_id} has no self edge")
            }
            Self::BadReflexiveEdge {
                ancestor_id,
                descendant_id,
                level,
            } => write!(
                f,
                "edge ({ancestor_id}, {descendant_id}) has invalid level {level}"
            ),
            Self::DanglingEdge {
                ancestor_id,
                descendant_id,
            } => write!(
                f,
                "edge ({ancestor_id}, {descendant_id}) references a missing category"
            ),
            Self::MultipleParents {
                category_id,
                parents,
            } => write!(f, "category {category_id} has parents {parents:?}"),
            Self::LevelGap {
                category_id,
                levels,
            } => write!(f, "category {category_id} has ancestor levels {levels:?}"),
            Self::NotTransitive { category_id, .. } => write!(
                f,
                "ancestor rows of category {category_id} differ from the parent chain"
            ),
        }
    }
}

/// Result of a full integrity pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Number of live categories inspected.
    pub live_categories: u64,
    /// Number of closure rows inspected.
    pub edges: u64,
    /// Everything that is wrong.
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    /// Whether no violation was found.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// One-line summary of the first few violations.
    pub fn summary(&self) -> String {
        if self.violations.is_empty() {
            return format!(
                "{} categories, {} closure rows, consistent",
                self.live_categories, self.edges
            );
        }
        let shown: Vec<String> = self.violations.iter().take(3).map(|v| v.to_string()).collect();
        format!(
            "{} violation(s): {}",
            self.violations.len(),
            shown.join("; ")
        )
    }
}
