//! Closure-table edge.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use learnshare_core::types::CategoryId;

/// One row of the category closure relation.
///
/// `level` is the number of parent steps from `ancestor_id` down to
/// `descendant_id`; it is 0 exactly for the reflexive self-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromRow)]
pub struct ClosureEdge {
    /// The ancestor end.
    pub ancestor_id: CategoryId,
    /// The descendant end.
    pub descendant_id: CategoryId,
    /// Distance from ancestor to descendant.
    pub level: i32,
}

impl ClosureEdge {
    /// Create an edge.
    pub fn new(ancestor_id: CategoryId, descendant_id: CategoryId, level: i32) -> Self {
        Self {
            ancestor_id,
            descendant_id,
            level,
        }
    }

    /// The reflexive edge of `id`.
    pub fn reflexive(id: CategoryId) -> Self {
        Self::new(id, id, 0)
    }

    /// Check if this is the self-edge.
    pub fn is_reflexive(&self) -> bool {
        self.level == 0 && self.ancestor_id == self.descendant_id
    }

    /// Check if this is a direct parent-child edge.
    pub fn is_parent_link(&self) -> bool {
        self.level == 1
    }

    /// Check if the edge touches `id` at either end.
    pub fn touches(&self, id: CategoryId) -> bool {
        self.ancestor_id == id || self.descendant_id == id
    }
}

impl From<(i64, i64, i32)> for ClosureEdge {
    fn from((ancestor, descendant, level): (i64, i64, i32)) -> Self {
        Self::new(CategoryId(ancestor), CategoryId(descendant), level)
    }
}
