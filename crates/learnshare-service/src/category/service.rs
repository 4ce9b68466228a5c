//! Category hierarchy use cases.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use validator::Validate;

use learnshare_core::config::{AppConfig, HierarchyConfig};
use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::traits::AssignmentSource;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_database::hierarchy::{HierarchyBackend, HierarchyStores, HierarchyView};
use learnshare_entity::category::{
    Category, CategoryCrumb, CategoryDto, CategoryStatus, CategoryTreeNode, CreateCategory,
    DeleteOutcome, IntegrityReport, ListScope, MoveOutcome, PurgeOutcome, slugify,
};

use super::bulk::BulkReport;
use super::cache::{TreeCache, TreeKey};
use super::request::{CreateCategoryRequest, UpdateCategoryRequest};
use super::tree::TreeBuilder;

/// Façade over the category hierarchy.
///
/// Requests are validated and checked against the committed state before
/// the backend is called, so validation, not-found and cycle failures
/// never open a transaction. The backend repeats the structural checks
/// under its lock.
#[derive(Debug, Clone)]
pub struct CategoryService {
    /// Category rows and closure index.
    hierarchy: Arc<dyn HierarchyBackend>,
    /// Document assignment collaborator.
    assignments: Arc<dyn AssignmentSource>,
    /// Assembled tree cache.
    cache: Arc<TreeCache>,
    /// Hierarchy settings.
    config: HierarchyConfig,
}

impl CategoryService {
    /// Creates a new category service.
    pub fn new(
        hierarchy: Arc<dyn HierarchyBackend>,
        assignments: Arc<dyn AssignmentSource>,
        cache: Arc<TreeCache>,
        config: HierarchyConfig,
    ) -> Self {
        Self {
            hierarchy,
            assignments,
            cache,
            config,
        }
    }

    /// Wires the service to opened stores.
    pub fn from_stores(stores: &HierarchyStores, config: &AppConfig) -> Self {
        Self::new(
            Arc::clone(&stores.hierarchy),
            Arc::clone(&stores.assignments),
            Arc::new(TreeCache::new(&config.cache)),
            config.hierarchy.clone(),
        )
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Creates a category as a root or under a live parent.
    pub async fn create_category(&self, req: CreateCategoryRequest) -> AppResult<Category> {
        req.validate()?;

        let name = req.name.trim().to_string();
        let slug = req.slug.unwrap_or_else(|| slugify(&name));
        self.ensure_slug_available(&slug, None).await?;
        if let Some(parent_id) = req.parent_id {
            self.require_live(parent_id)
                .await
                .map_err(|_| AppError::not_found(format!("Parent category {parent_id} not found")))?;
        }

        let category = self
            .hierarchy
            .create_category(&CreateCategory {
                name,
                slug,
                description: req.description,
                status: req.status.unwrap_or_default(),
                sort_order: req.sort_order.unwrap_or(0),
                parent_id: req.parent_id,
            })
            .await?;
        self.cache.invalidate();

        info!(
            category_id = %category.id,
            parent_id = ?req.parent_id,
            slug = %category.slug,
            "Category created"
        );
        Ok(category)
    }

    /// Changes display attributes; the tree position is untouched.
    pub async fn update_category(
        &self,
        id: CategoryId,
        req: UpdateCategoryRequest,
    ) -> AppResult<Category> {
        req.validate()?;
        let current = self.require_live(id).await?;

        let patch = req.into_patch();
        if patch.is_empty() {
            return Ok(current);
        }
        if let Some(slug) = &patch.slug {
            self.ensure_slug_available(slug, Some(id)).await?;
        }

        let category = self.hierarchy.update_category(id, &patch).await?;
        self.cache.invalidate();

        info!(category_id = %id, "Category updated");
        Ok(category)
    }

    /// Renames a category. The slug is kept.
    pub async fn rename_category(&self, id: CategoryId, name: &str) -> AppResult<Category> {
        self.update_category(
            id,
            UpdateCategoryRequest {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Sets the status of a category.
    pub async fn update_status(&self, id: CategoryId, status: CategoryStatus) -> AppResult<Category> {
        self.update_category(
            id,
            UpdateCategoryRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Flips a category between active and inactive.
    pub async fn toggle_status(&self, id: CategoryId) -> AppResult<Category> {
        let current = self.require_live(id).await?;
        self.update_status(id, current.status.toggled()).await
    }

    /// Changes the sibling position of a category.
    pub async fn reorder(&self, id: CategoryId, sort_order: i32) -> AppResult<Category> {
        self.update_category(
            id,
            UpdateCategoryRequest {
                sort_order: Some(sort_order),
                ..Default::default()
            },
        )
        .await
    }

    /// Moves a category, with its whole subtree, under `new_parent`, or
    /// makes it a root when `new_parent` is `None`.
    pub async fn move_category(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<MoveOutcome> {
        self.require_live(id).await?;
        if let Some(parent) = new_parent {
            self.require_live(parent).await.map_err(|_| {
                AppError::not_found(format!("Target parent category {parent} not found"))
            })?;
            if parent == id || self.hierarchy.edge_exists(id, parent).await? {
                return Err(AppError::cycle(format!(
                    "Category {id} cannot be moved under itself or its descendant {parent}"
                )));
            }
        }

        let outcome = self.hierarchy.move_subtree(id, new_parent).await?;
        self.cache.invalidate();

        info!(
            category_id = %id,
            old_parent_id = ?outcome.old_parent_id,
            new_parent_id = ?outcome.new_parent_id,
            subtree_size = outcome.subtree_size,
            edges_removed = outcome.edges_removed,
            edges_inserted = outcome.edges_inserted,
            "Category moved"
        );
        Ok(outcome)
    }

    /// Soft-deletes a category under `policy`, or the configured default.
    pub async fn delete_category(
        &self,
        id: CategoryId,
        policy: Option<DeletePolicy>,
    ) -> AppResult<DeleteOutcome> {
        let policy = policy.unwrap_or(self.config.default_delete_policy);
        self.require_live(id).await?;

        // Children and documents are counted by the backend under its lock.
        let outcome = self.hierarchy.delete_category(id, policy).await?;
        self.cache.invalidate();

        info!(
            category_id = %id,
            policy = %policy,
            deleted = outcome.deleted.len(),
            promoted = outcome.promoted.len(),
            edges_removed = outcome.edges_removed,
            "Category deleted"
        );
        Ok(outcome)
    }

    /// Deletes several categories as one operation.
    ///
    /// Every id must be live; an unknown id, a blocked delete or any other
    /// failure leaves every category in place. An id already removed by an
    /// earlier cascade in the same request is skipped.
    pub async fn delete_categories(
        &self,
        ids: &[CategoryId],
        policy: Option<DeletePolicy>,
    ) -> AppResult<Vec<DeleteOutcome>> {
        let policy = policy.unwrap_or(self.config.default_delete_policy);
        let ids = distinct(ids);
        for id in &ids {
            self.require_live(*id).await?;
        }

        let outcomes = self.hierarchy.delete_categories(&ids, policy).await?;
        self.cache.invalidate();

        let deleted: usize = outcomes.iter().map(|o| o.deleted.len()).sum();
        info!(
            requested = ids.len(),
            deleted,
            policy = %policy,
            "Categories deleted"
        );
        Ok(outcomes)
    }

    /// Brings a soft-deleted category back as a root or under a live parent.
    pub async fn restore_category(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<Category> {
        let existing = self
            .hierarchy
            .find_category(id)
            .await?
            .filter(|c| !c.is_live())
            .ok_or_else(|| AppError::not_found(format!("Deleted category {id} not found")))?;
        self.ensure_slug_available(&existing.slug, Some(id)).await?;
        if let Some(parent) = parent {
            self.require_live(parent)
                .await
                .map_err(|_| AppError::not_found(format!("Parent category {parent} not found")))?;
        }

        let category = self.hierarchy.restore_category(id, parent).await?;
        self.cache.invalidate();

        info!(category_id = %id, parent_id = ?parent, "Category restored");
        Ok(category)
    }

    /// Restores each id as a root; a failure does not undo earlier restores.
    pub async fn restore_categories(&self, ids: &[CategoryId]) -> BulkReport {
        let mut report = BulkReport::default();
        for id in ids {
            let result = self.restore_category(*id, None).await.map(|_| ());
            if let Err(err) = &result {
                warn!(category_id = %id, error = %err, "Bulk restore skipped category");
            }
            report.record(*id, result);
        }
        report
    }

    /// Permanently removes a soft-deleted category and its assignments.
    pub async fn purge_category(&self, id: CategoryId) -> AppResult<Category> {
        let outcome = self.purge_categories(&[id]).await?;
        outcome
            .purged
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal(format!("Purge of category {id} returned no row")))
    }

    /// Permanently removes soft-deleted categories; all or nothing.
    pub async fn purge_categories(&self, ids: &[CategoryId]) -> AppResult<PurgeOutcome> {
        let ids = distinct(ids);
        for id in &ids {
            match self.hierarchy.find_category(*id).await? {
                None => return Err(AppError::not_found(format!("Category {id} not found"))),
                Some(c) if c.is_live() => {
                    return Err(AppError::conflict(format!(
                        "Category {id} must be deleted before it can be purged"
                    )));
                }
                Some(_) => {}
            }
        }

        let outcome = self.hierarchy.purge_categories(&ids).await?;
        self.cache.invalidate();

        info!(
            purged = outcome.purged.len(),
            assignments = outcome.assignments_removed,
            "Categories purged"
        );
        Ok(outcome)
    }

    /// Attaches a document to a live category.
    pub async fn assign_document(&self, document: DocumentId, category: CategoryId) -> AppResult<bool> {
        self.require_live(category).await?;
        let added = self.hierarchy.assign_document(document, category).await?;
        if added {
            self.cache.invalidate();
            info!(document_id = %document, category_id = %category, "Document assigned");
        }
        Ok(added)
    }

    /// Detaches a document from a live category.
    pub async fn unassign_document(
        &self,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        self.require_live(category).await?;
        let removed = self.hierarchy.unassign_document(document, category).await?;
        if removed {
            self.cache.invalidate();
            info!(document_id = %document, category_id = %category, "Document unassigned");
        }
        Ok(removed)
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// A live category with its position and counts.
    pub async fn get_category(&self, id: CategoryId) -> AppResult<CategoryDto> {
        let lineage = self
            .hierarchy
            .load_lineage(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))?;

        let parent_id = lineage
            .ancestors
            .iter()
            .find(|e| e.level == 1)
            .map(|e| e.ancestor_id);
        let subcategories = lineage.descendants.iter().filter(|e| e.level == 1).count() as u64;
        let subtree: Vec<CategoryId> = lineage.descendants.iter().map(|e| e.descendant_id).collect();
        let document_count = self.assignments.count_subtree_assignments(&subtree).await?;

        Ok(CategoryDto::from_category(
            &lineage.category,
            parent_id,
            lineage.ancestors.len() as i32,
            document_count,
            subcategories,
        ))
    }

    /// Live roots regardless of status, in display order.
    pub async fn get_root_categories(&self) -> AppResult<Vec<CategoryDto>> {
        let (forest, _) = self.load_forest().await?;
        let roots: Vec<Category> = forest.roots().into_iter().cloned().collect();
        self.to_dtos(&forest, &roots).await
    }

    /// Live ACTIVE roots, in display order.
    pub async fn get_active_root_categories(&self) -> AppResult<Vec<CategoryDto>> {
        let (forest, _) = self.load_forest().await?;
        let roots: Vec<Category> = forest
            .roots()
            .into_iter()
            .filter(|c| c.is_active())
            .cloned()
            .collect();
        self.to_dtos(&forest, &roots).await
    }

    /// Every live category, newest first.
    pub async fn get_all_categories(&self) -> AppResult<Vec<CategoryDto>> {
        let (forest, view) = self.load_forest().await?;
        let mut all = view.categories;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.to_dtos(&forest, &all).await
    }

    /// Soft-deleted categories, most recently deleted first.
    pub async fn get_deleted_categories(&self) -> AppResult<Vec<CategoryDto>> {
        let mut deleted = self.hierarchy.list_categories(ListScope::Deleted).await?;
        deleted.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then(b.id.cmp(&a.id)));

        let mut dtos = Vec::with_capacity(deleted.len());
        for category in &deleted {
            let documents = self.assignments.count_direct_assignments(category.id).await?;
            dtos.push(CategoryDto::from_category(category, None, 0, documents, 0));
        }
        Ok(dtos)
    }

    /// Direct children of `id` in display order; empty for an unknown id.
    pub async fn get_children(&self, id: CategoryId) -> AppResult<Vec<CategoryDto>> {
        let (forest, _) = self.load_forest().await?;
        let children: Vec<Category> = forest.build_children(id).into_iter().cloned().collect();
        self.to_dtos(&forest, &children).await
    }

    /// Nested view of `id` down to `max_depth` levels below it.
    ///
    /// An unknown or deleted id yields `None`, not an error.
    pub async fn get_subcategories_tree(
        &self,
        id: CategoryId,
        max_depth: Option<u32>,
    ) -> AppResult<Option<CategoryTreeNode>> {
        let key = TreeKey::Subtree { root: id, max_depth };
        if let Some(hit) = self.cache.get(key).await {
            return Ok(hit.first().cloned());
        }
        let generation = self.cache.generation();

        let view = self.hierarchy.load_subtree(id).await?;
        if view.is_empty() {
            warn!(category_id = %id, "Subtree requested for unknown or deleted category");
            return Ok(None);
        }
        debug!(
            category_id = %id,
            categories = view.categories.len(),
            links = view.links.len(),
            "Loaded category subtree"
        );
        let builder = TreeBuilder::new(view.categories, &view.links);

        let visible = builder.visible_ids(id, max_depth);
        let counts = self.document_counts(&builder, &visible).await?;
        let tree = builder
            .with_document_counts(counts)
            .build_subtree(id, max_depth);

        self.cache
            .insert(generation, key, Arc::new(tree.iter().cloned().collect()))
            .await;
        Ok(tree)
    }

    /// ACTIVE roots with their ACTIVE descendants, `picker_depth` levels deep.
    pub async fn get_picker_tree(&self) -> AppResult<Vec<CategoryTreeNode>> {
        if let Some(hit) = self.cache.get(TreeKey::Picker).await {
            return Ok(hit.as_ref().clone());
        }
        let generation = self.cache.generation();

        let (full, view) = self.load_forest().await?;
        let active = TreeBuilder::new(
            view.categories.into_iter().filter(Category::is_active),
            &view.links,
        );

        let max_depth = Some(self.config.picker_depth.saturating_sub(1));
        let roots: Vec<CategoryId> = full
            .roots()
            .into_iter()
            .filter(|c| c.is_active())
            .map(|c| c.id)
            .collect();
        let visible: Vec<CategoryId> = roots
            .iter()
            .flat_map(|root| active.visible_ids(*root, max_depth))
            .collect();
        let counts = self.document_counts(&full, &visible).await?;
        let active = active.with_document_counts(counts);

        let forest: Vec<CategoryTreeNode> = roots
            .iter()
            .filter_map(|root| active.build_subtree(*root, max_depth))
            .collect();
        self.cache
            .insert(generation, TreeKey::Picker, Arc::new(forest.clone()))
            .await;
        Ok(forest)
    }

    /// Path from the root down to `id`; empty for an unknown id.
    pub async fn get_breadcrumb(&self, id: CategoryId) -> AppResult<Vec<CategoryCrumb>> {
        let Some(lineage) = self.hierarchy.load_lineage(id).await? else {
            warn!(category_id = %id, "Breadcrumb requested for unknown or deleted category");
            return Ok(Vec::new());
        };
        Ok(TreeBuilder::new(lineage.path, &[]).build_breadcrumb(id, &lineage.ancestors))
    }

    /// Distinct documents attached to `id` or any of its descendants.
    pub async fn document_count(&self, id: CategoryId) -> AppResult<u64> {
        let Some(lineage) = self.hierarchy.load_lineage(id).await? else {
            return Ok(0);
        };
        let subtree: Vec<CategoryId> = lineage.descendants.iter().map(|e| e.descendant_id).collect();
        self.assignments.count_subtree_assignments(&subtree).await
    }

    /// Full-scan integrity check of the committed closure index.
    pub async fn verify_integrity(&self) -> AppResult<IntegrityReport> {
        let report = self.hierarchy.verify_integrity().await?;
        if report.is_consistent() {
            info!(
                categories = report.live_categories,
                edges = report.edges,
                "Closure index is consistent"
            );
        } else {
            error!(
                violations = report.violations.len(),
                summary = %report.summary(),
                "Closure index is corrupted"
            );
        }
        Ok(report)
    }

    // ── Helpers ────────────────────────────────────────────────────

    async fn require_live(&self, id: CategoryId) -> AppResult<Category> {
        self.hierarchy
            .find_category(id)
            .await?
            .filter(Category::is_live)
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    async fn ensure_slug_available(&self, slug: &str, owner: Option<CategoryId>) -> AppResult<()> {
        match self.hierarchy.find_live_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != owner => Err(AppError::validation(format!(
                "Slug '{slug}' is already used by category {}",
                existing.id
            ))),
            _ => Ok(()),
        }
    }

    /// Every live category and parent link, from one snapshot.
    async fn load_forest(&self) -> AppResult<(TreeBuilder, HierarchyView)> {
        let view = self.hierarchy.load_forest().await?;
        debug!(
            categories = view.categories.len(),
            links = view.links.len(),
            "Loaded category forest"
        );
        let builder = TreeBuilder::new(view.categories.iter().cloned(), &view.links);
        Ok((builder, view))
    }

    /// Subtree document counts for `ids`, using `builder`'s descendant sets.
    async fn document_counts(
        &self,
        builder: &TreeBuilder,
        ids: &[CategoryId],
    ) -> AppResult<HashMap<CategoryId, u64>> {
        let mut counts = HashMap::with_capacity(ids.len());
        for id in ids {
            let subtree = builder.subtree_ids(*id);
            let count = self.assignments.count_subtree_assignments(&subtree).await?;
            counts.insert(*id, count);
        }
        Ok(counts)
    }

    async fn to_dtos(&self, forest: &TreeBuilder, categories: &[Category]) -> AppResult<Vec<CategoryDto>> {
        let ids: Vec<CategoryId> = categories.iter().map(|c| c.id).collect();
        let counts = self.document_counts(forest, &ids).await?;
        Ok(categories
            .iter()
            .map(|c| {
                CategoryDto::from_category(
                    c,
                    forest.parent_of(c.id),
                    forest.depth_of(c.id),
                    counts.get(&c.id).copied().unwrap_or(0),
                    forest.child_count(c.id),
                )
            })
            .collect())
    }
}

/// `ids` without repeats, first occurrence kept.
fn distinct(ids: &[CategoryId]) -> Vec<CategoryId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
