//! Category entity model.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use learnshare_core::types::CategoryId;

use super::status::CategoryStatus;

/// A node in the category hierarchy.
///
/// Position in the tree is never stored here; it lives only in the
/// closure index, which references categories by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    /// Stable surrogate key.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug, unique among live categories.
    pub slug: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Visibility status.
    pub status: CategoryStatus,
    /// Position among siblings (ties broken by name).
    pub sort_order: i32,
    /// When the category was created.
    pub created_at: DateTime<Utc>,
    /// When the category was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the category was soft-deleted (`None` while live).
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Category {
    /// Check whether the category has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Check whether the category is live and shown to readers.
    pub fn is_active(&self) -> bool {
        self.is_live() && self.status == CategoryStatus::Active
    }

    /// Sibling display order: `sort_order` ascending, then name, then id.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.sort_order
            .cmp(&other.sort_order)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Data required to create a new category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategory {
    /// Display name (already trimmed and validated).
    pub name: String,
    /// URL slug (already generated or validated).
    pub slug: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial status.
    pub status: CategoryStatus,
    /// Initial sibling position.
    pub sort_order: i32,
    /// Parent category (`None` creates a root).
    pub parent_id: Option<CategoryId>,
}

/// Display-attribute changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
    /// New display name.
    pub name: Option<String>,
    /// New slug.
    pub slug: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New status.
    pub status: Option<CategoryStatus>,
    /// New sibling position.
    pub sort_order: Option<i32>,
}

impl CategoryPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.sort_order.is_none()
    }

    /// Apply the patch to `category` in place.
    pub fn apply_to(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(slug) = &self.slug {
            category.slug = slug.clone();
        }
        if let Some(description) = &self.description {
            category.description = description.clone();
        }
        if let Some(status) = self.status {
            category.status = status;
        }
        if let Some(sort_order) = self.sort_order {
            category.sort_order = sort_order;
        }
    }
}

/// Which categories a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Only categories that are not soft-deleted.
    Live,
    /// Only soft-deleted categories.
    Deleted,
    /// Everything.
    All,
}

impl ListScope {
    /// Whether a category belongs to this scope.
    pub fn contains(&self, category: &Category) -> bool {
        match self {
            Self::Live => category.is_live(),
            Self::Deleted => !category.is_live(),
            Self::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, sort_order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId(id),
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: None,
            status: CategoryStatus::Active,
            sort_order,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_display_order_uses_sort_order_then_name() {
        let mut items = vec![
            category(1, "Physics", 1),
            category(2, "Algebra", 1),
            category(3, "Zoology", 0),
        ];
        items.sort_by(|a, b| a.display_cmp(b));
        let names: Vec<&str> = items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Zoology", "Algebra", "Physics"]);
    }

    #[test]
    fn test_patch_applies_only_given_fields() {
        let mut cat = category(1, "Physics", 0);
        let patch = CategoryPatch {
            name: Some("Applied Physics".to_string()),
            sort_order: Some(4),
            ..Default::default()
        };
        patch.apply_to(&mut cat);
        assert_eq!(cat.name, "Applied Physics");
        assert_eq!(cat.slug, "physics");
        assert_eq!(cat.sort_order, 4);
        assert!(!patch.is_empty());
        assert!(CategoryPatch::default().is_empty());
    }

    #[test]
    fn test_patch_can_clear_description() {
        let mut cat = category(1, "Physics", 0);
        cat.description = Some("Mechanics and optics".to_string());

        CategoryPatch::default().apply_to(&mut cat);
        assert_eq!(cat.description.as_deref(), Some("Mechanics and optics"));

        let clear = CategoryPatch {
            description: Some(None),
            ..Default::default()
        };
        assert!(!clear.is_empty());
        clear.apply_to(&mut cat);
        assert_eq!(cat.description, None);
    }

    #[test]
    fn test_scope_membership() {
        let mut cat = category(1, "Physics", 0);
        assert!(ListScope::Live.contains(&cat));
        cat.deleted_at = Some(Utc::now());
        assert!(ListScope::Deleted.contains(&cat));
        assert!(!cat.is_active());
        assert!(ListScope::All.contains(&cat));
    }
}
