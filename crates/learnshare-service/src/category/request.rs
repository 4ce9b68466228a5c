//! Category request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use learnshare_core::types::CategoryId;
use learnshare_entity::category::{CategoryPatch, CategoryStatus, is_valid_slug};

/// Create category request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    /// Display name.
    #[validate(
        length(min = 1, max = 255, message = "must be 1-255 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    /// Explicit slug; generated from the name when absent.
    #[validate(custom(function = "slug_format"))]
    pub slug: Option<String>,
    /// Description.
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    /// Initial status (defaults to active).
    pub status: Option<CategoryStatus>,
    /// Sibling position (defaults to 0).
    pub sort_order: Option<i32>,
    /// Parent category; `None` creates a root.
    pub parent_id: Option<CategoryId>,
}

impl CreateCategoryRequest {
    /// A request for a root or child category named `name`.
    pub fn named(name: impl Into<String>, parent_id: Option<CategoryId>) -> Self {
        Self {
            name: name.into(),
            parent_id,
            ..Default::default()
        }
    }
}

/// Update category request; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    /// New display name.
    #[validate(
        length(min = 1, max = 255, message = "must be 1-255 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    /// New slug.
    #[validate(custom(function = "slug_format"))]
    pub slug: Option<String>,
    /// New description.
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    /// Remove the description; wins over `description`.
    #[serde(default)]
    pub clear_description: bool,
    /// New status.
    pub status: Option<CategoryStatus>,
    /// New sibling position.
    pub sort_order: Option<i32>,
}

impl UpdateCategoryRequest {
    /// Normalised patch for the store.
    pub fn into_patch(self) -> CategoryPatch {
        CategoryPatch {
            name: self.name.map(|n| n.trim().to_string()),
            slug: self.slug,
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.map(Some)
            },
            status: self.status,
            sort_order: self.sort_order,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

fn slug_format(value: &str) -> Result<(), ValidationError> {
    if !is_valid_slug(value) {
        return Err(ValidationError::new("slug").with_message(
            "must be lower-case letters and digits separated by single hyphens".into(),
        ));
    }
    Ok(())
}
