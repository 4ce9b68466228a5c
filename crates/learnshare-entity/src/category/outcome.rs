//! Results of topology-changing operations.

use serde::{Deserialize, Serialize};

use learnshare_core::types::{CategoryId, DeletePolicy};

use super::model::Category;

/// What a committed move changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// The subtree root that moved.
    pub category_id: CategoryId,
    /// Parent before the move (`None` for a root).
    pub old_parent_id: Option<CategoryId>,
    /// Parent after the move (`None` for a root).
    pub new_parent_id: Option<CategoryId>,
    /// Number of categories carried along, including the root.
    pub subtree_size: u64,
    /// Closure rows deleted when detaching from the old position.
    pub edges_removed: u64,
    /// Closure rows inserted when attaching to the new position.
    pub edges_inserted: u64,
}

/// What a committed delete changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Policy the delete ran under.
    pub policy: DeletePolicy,
    /// Categories soft-deleted, requested category first.
    pub deleted: Vec<CategoryId>,
    /// Direct children re-attached under the grandparent (promote only).
    pub promoted: Vec<CategoryId>,
    /// Total closure rows removed, including rows rewritten by promotion.
    pub edges_removed: u64,
}

/// What a committed purge removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    /// Rows physically deleted, in request order.
    pub purged: Vec<Category>,
    /// Document assignments dropped along with them.
    pub assignments_removed: u64,
}
