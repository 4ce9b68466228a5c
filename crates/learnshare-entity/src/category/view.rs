//! View objects handed to controllers, the admin UI, and the upload wizard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnshare_core::types::CategoryId;

use super::model::Category;
use super::status::CategoryStatus;

/// Flat category row with its position and counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDto {
    /// Category id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Description.
    pub description: Option<String>,
    /// Status.
    pub status: CategoryStatus,
    /// Sibling position.
    pub sort_order: i32,
    /// Direct parent (`None` for roots and deleted categories).
    pub parent_id: Option<CategoryId>,
    /// Depth below its root (0 for roots).
    pub level: i32,
    /// Distinct documents in this category and its descendants.
    pub document_count: u64,
    /// Number of direct live children.
    pub subcategory_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete time.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CategoryDto {
    /// Build a row from a category and its resolved position.
    pub fn from_category(
        category: &Category,
        parent_id: Option<CategoryId>,
        level: i32,
        document_count: u64,
        subcategory_count: u64,
    ) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
            status: category.status,
            sort_order: category.sort_order,
            parent_id,
            level,
            document_count,
            subcategory_count,
            created_at: category.created_at,
            updated_at: category.updated_at,
            deleted_at: category.deleted_at,
        }
    }
}

/// A node of an assembled category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTreeNode {
    /// Category id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Description.
    pub description: Option<String>,
    /// Status.
    pub status: CategoryStatus,
    /// Distinct documents in this node's subtree.
    pub document_count: u64,
    /// Ordered child nodes (empty when depth-limited).
    pub children: Vec<CategoryTreeNode>,
}

impl CategoryTreeNode {
    /// Total number of nodes in this tree, including the root.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(CategoryTreeNode::len).sum::<usize>()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Node ids in pre-order.
    pub fn ids(&self) -> Vec<CategoryId> {
        let mut out = vec![self.id];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCrumb {
    /// Category id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}

impl From<&Category> for CategoryCrumb {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}
