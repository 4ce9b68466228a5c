//! In-memory category table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::types::CategoryId;
use learnshare_entity::category::{Category, CategoryPatch, CreateCategory, ListScope};

/// Category rows keyed by id. Ids are assigned sequentially from 1.
#[derive(Debug, Clone, Default)]
pub struct CategoryStore {
    rows: BTreeMap<CategoryId, Category>,
    last_id: i64,
}

impl CategoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new live category.
    pub fn create(&mut self, data: &CreateCategory, now: DateTime<Utc>) -> AppResult<Category> {
        self.ensure_slug_free(&data.slug, None)?;
        self.last_id += 1;
        let category = Category {
            id: CategoryId(self.last_id),
            name: data.name.clone(),
            slug: data.slug.clone(),
            description: data.description.clone(),
            status: data.status,
            sort_order: data.sort_order,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.rows.insert(category.id, category.clone());
        Ok(category)
    }

    /// Any category, live or soft-deleted.
    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.rows.get(&id)
    }

    /// A live category, or a not-found error.
    pub fn get_live(&self, id: CategoryId) -> AppResult<&Category> {
        self.rows
            .get(&id)
            .filter(|c| c.is_live())
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    /// Live category owning `slug`.
    pub fn find_live_by_slug(&self, slug: &str) -> Option<&Category> {
        self.rows.values().find(|c| c.is_live() && c.slug == slug)
    }

    /// Categories in `scope`, by id.
    pub fn list(&self, scope: ListScope) -> Vec<Category> {
        self.rows
            .values()
            .filter(|c| scope.contains(c))
            .cloned()
            .collect()
    }

    /// Ids of every live category.
    pub fn live_ids(&self) -> BTreeSet<CategoryId> {
        self.rows
            .values()
            .filter(|c| c.is_live())
            .map(|c| c.id)
            .collect()
    }

    /// Change display attributes of a live category.
    pub fn update(
        &mut self,
        id: CategoryId,
        patch: &CategoryPatch,
        now: DateTime<Utc>,
    ) -> AppResult<Category> {
        self.get_live(id)?;
        if let Some(slug) = &patch.slug {
            self.ensure_slug_free(slug, Some(id))?;
        }
        let category = self.live_mut(id)?;
        patch.apply_to(category);
        category.updated_at = now;
        Ok(category.clone())
    }

    /// Mark a live category as deleted.
    pub fn soft_delete(&mut self, id: CategoryId, now: DateTime<Utc>) -> AppResult<()> {
        let category = self.live_mut(id)?;
        category.deleted_at = Some(now);
        category.updated_at = now;
        Ok(())
    }

    /// Clear the deletion mark of a soft-deleted category.
    pub fn restore(&mut self, id: CategoryId, now: DateTime<Utc>) -> AppResult<Category> {
        let slug = match self.rows.get(&id) {
            Some(c) if !c.is_live() => c.slug.clone(),
            _ => {
                return Err(AppError::not_found(format!(
                    "Deleted category {id} not found"
                )));
            }
        };
        self.ensure_slug_free(&slug, Some(id))?;
        let category = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))?;
        category.deleted_at = None;
        category.updated_at = now;
        Ok(category.clone())
    }

    /// Permanently remove a soft-deleted category.
    pub fn purge(&mut self, id: CategoryId) -> AppResult<Category> {
        self.deleted(id)?;
        self.rows
            .remove(&id)
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    fn deleted(&self, id: CategoryId) -> AppResult<&Category> {
        match self.rows.get(&id) {
            Some(c) if !c.is_live() => Ok(c),
            Some(_) => Err(AppError::conflict(format!(
                "Category {id} is not deleted"
            ))),
            None => Err(AppError::not_found(format!("Category {id} not found"))),
        }
    }

    fn live_mut(&mut self, id: CategoryId) -> AppResult<&mut Category> {
        self.rows
            .get_mut(&id)
            .filter(|c| c.is_live())
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    fn ensure_slug_free(&self, slug: &str, except: Option<CategoryId>) -> AppResult<()> {
        match self.find_live_by_slug(slug) {
            Some(owner) if Some(owner.id) != except => Err(AppError::validation(format!(
                "Slug '{slug}' is already used by category {}",
                owner.id
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnshare_core::error::ErrorKind;
    use learnshare_entity::category::CategoryStatus;

    fn input(name: &str, slug: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            status: CategoryStatus::Active,
            sort_order: 0,
            parent_id: None,
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        let a = store.create(&input("Math", "math"), now).unwrap();
        let b = store.create(&input("Physics", "physics"), now).unwrap();
        assert_eq!(a.id, CategoryId(1));
        assert_eq!(b.id, CategoryId(2));
    }

    #[test]
    fn test_live_slug_must_be_unique() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        store.create(&input("Math", "math"), now).unwrap();
        let err = store.create(&input("Maths", "math"), now).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_deleted_slug_can_be_reused_but_blocks_restore() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        let old = store.create(&input("Math", "math"), now).unwrap();
        store.soft_delete(old.id, now).unwrap();
        store.create(&input("Math", "math"), now).unwrap();

        let err = store.restore(old.id, now).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let live = store.find_live_by_slug("math").unwrap().id;
        assert_eq!(store.restore(live, now).unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_soft_delete_hides_from_live_scope() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        let a = store.create(&input("Math", "math"), now).unwrap();
        store.create(&input("Physics", "physics"), now).unwrap();
        store.soft_delete(a.id, now).unwrap();

        assert_eq!(store.list(ListScope::Live).len(), 1);
        assert_eq!(store.list(ListScope::Deleted)[0].id, a.id);
        assert_eq!(store.list(ListScope::All).len(), 2);
        assert_eq!(store.get_live(a.id).unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(
            store.update(a.id, &CategoryPatch::default(), now).unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_update_keeps_own_slug() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        let a = store.create(&input("Math", "math"), now).unwrap();
        let patch = CategoryPatch {
            slug: Some("math".to_string()),
            name: Some("Mathematics".to_string()),
            ..Default::default()
        };
        let updated = store.update(a.id, &patch, now).unwrap();
        assert_eq!(updated.name, "Mathematics");
    }

    #[test]
    fn test_purge_requires_soft_delete() {
        let mut store = CategoryStore::new();
        let now = Utc::now();
        let a = store.create(&input("Math", "math"), now).unwrap();
        assert_eq!(store.purge(a.id).unwrap_err().kind, ErrorKind::Conflict);
        store.soft_delete(a.id, now).unwrap();
        store.purge(a.id).unwrap();
        assert!(store.get(a.id).is_none());
        assert_eq!(store.purge(a.id).unwrap_err().kind, ErrorKind::NotFound);
    }
}
