//! Process-local hierarchy backend.
//!
//! Readers work on an immutable snapshot. A writer clones the snapshot,
//! applies the whole operation to the copy and swaps it in only when every
//! step succeeded, so a failed operation leaves no trace.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, warn};

use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_entity::category::{
    Category, CategoryPatch, ClosureEdge, CreateCategory, DeleteOutcome, IntegrityReport,
    ListScope, MoveOutcome, PurgeOutcome,
};

use super::{BackendOptions, HierarchyBackend, HierarchyView, Lineage};
use crate::integrity;
use crate::memory::{CategoryStore, ClosureIndex, MemoryAssignments};

#[derive(Debug, Clone, Default)]
struct HierarchyState {
    store: CategoryStore,
    index: ClosureIndex,
}

impl HierarchyState {
    fn is_live(&self, id: CategoryId) -> bool {
        self.store.get(id).is_some_and(Category::is_live)
    }

    fn live_edges(&self, edges: Vec<ClosureEdge>) -> Vec<ClosureEdge> {
        edges
            .into_iter()
            .filter(|e| self.is_live(e.ancestor_id) && self.is_live(e.descendant_id))
            .collect()
    }

    /// Live categories among `ids`, ordered by id.
    fn live_categories(&self, ids: impl IntoIterator<Item = CategoryId>) -> Vec<Category> {
        let mut found: Vec<Category> = ids
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .filter(|c| c.is_live())
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id);
        found.dedup_by_key(|c| c.id);
        found
    }

    fn delete_one(
        &mut self,
        assignments: &MemoryAssignments,
        id: CategoryId,
        policy: DeletePolicy,
        now: DateTime<Utc>,
    ) -> AppResult<DeleteOutcome> {
        self.store.get_live(id)?;
        if policy == DeletePolicy::BlockIfNonempty {
            let documents = assignments.direct_count(id);
            if documents > 0 {
                return Err(AppError::conflict(format!(
                    "Category {id} still has {documents} documents"
                )));
            }
        }
        let removal = self.index.delete_node(id, policy)?;
        for member in &removal.removed {
            self.store.soft_delete(*member, now)?;
        }
        Ok(DeleteOutcome {
            policy,
            deleted: removal.removed,
            promoted: removal.promoted,
            edges_removed: removal.edges_removed,
        })
    }

    fn integrity(&self) -> IntegrityReport {
        integrity::check(&self.store.live_ids(), &self.index.edges())
    }
}

/// Category hierarchy held in memory.
///
/// Shares its assignment table with the [`MemoryAssignments`] handed out
/// as the stores' assignment source; writes to it happen under the
/// writer lock.
#[derive(Debug)]
pub struct MemoryHierarchy {
    state: RwLock<Arc<HierarchyState>>,
    writer: Mutex<()>,
    assignments: Arc<MemoryAssignments>,
    options: BackendOptions,
}

impl MemoryHierarchy {
    /// Create an empty hierarchy over `assignments`.
    pub fn new(assignments: Arc<MemoryAssignments>, options: BackendOptions) -> Self {
        Self {
            state: RwLock::new(Arc::new(HierarchyState::default())),
            writer: Mutex::new(()),
            assignments,
            options,
        }
    }

    async fn snapshot(&self) -> Arc<HierarchyState> {
        Arc::clone(&*self.state.read().await)
    }

    /// Wait for the writer lock, giving up after `lock_timeout`.
    async fn lock(&self, operation: &'static str) -> AppResult<MutexGuard<'_, ()>> {
        tokio::time::timeout(self.options.lock_timeout, self.writer.lock())
            .await
            .map_err(|_| {
                warn!(operation, "Timed out waiting for the hierarchy lock");
                AppError::conflict(format!(
                    "{operation}: timed out waiting for the category hierarchy lock"
                ))
            })
    }

    /// Run `apply` against a private copy and publish it on success.
    async fn mutate<T, F>(&self, operation: &'static str, apply: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(&mut HierarchyState, DateTime<Utc>) -> AppResult<T> + Send,
    {
        let _guard = self.lock(operation).await?;
        self.publish(operation, apply).await
    }

    /// Apply and publish; the caller holds the writer lock.
    async fn publish<T, F>(&self, operation: &'static str, apply: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(&mut HierarchyState, DateTime<Utc>) -> AppResult<T> + Send,
    {
        let mut next = HierarchyState::clone(&*self.snapshot().await);
        let value = apply(&mut next, Utc::now())?;

        if self.options.verify_invariants {
            let report = next.integrity();
            if !report.is_consistent() {
                error!(operation, summary = %report.summary(), "Mutation would corrupt the closure index");
                return Err(AppError::consistency(format!(
                    "{operation} rejected: {}",
                    report.summary()
                )));
            }
        }

        *self.state.write().await = Arc::new(next);
        debug!(operation, "Published new hierarchy snapshot");
        Ok(value)
    }

    async fn require_live(&self, id: CategoryId) -> AppResult<()> {
        if self.snapshot().await.is_live(id) {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Category {id} not found")))
        }
    }
}

#[async_trait]
impl HierarchyBackend for MemoryHierarchy {
    async fn find_category(&self, id: CategoryId) -> AppResult<Option<Category>> {
        Ok(self.snapshot().await.store.get(id).cloned())
    }

    async fn find_live_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        Ok(self.snapshot().await.store.find_live_by_slug(slug).cloned())
    }

    async fn list_categories(&self, scope: ListScope) -> AppResult<Vec<Category>> {
        Ok(self.snapshot().await.store.list(scope))
    }

    async fn load_forest(&self) -> AppResult<HierarchyView> {
        let state = self.snapshot().await;
        let links = state
            .index
            .edges()
            .into_iter()
            .filter(ClosureEdge::is_parent_link)
            .collect();
        Ok(HierarchyView {
            categories: state.store.list(ListScope::Live),
            links: state.live_edges(links),
        })
    }

    async fn load_subtree(&self, id: CategoryId) -> AppResult<HierarchyView> {
        let state = self.snapshot().await;
        if !state.is_live(id) {
            return Ok(HierarchyView::default());
        }
        let members = state.live_edges(state.index.descendants_of(id));
        Ok(HierarchyView {
            categories: state.live_categories(members.iter().map(|e| e.descendant_id)),
            links: state.live_edges(state.index.subtree_links(id)),
        })
    }

    async fn load_lineage(&self, id: CategoryId) -> AppResult<Option<Lineage>> {
        let state = self.snapshot().await;
        let Some(category) = state.store.get(id).filter(|c| c.is_live()).cloned() else {
            return Ok(None);
        };
        let ancestors = state.live_edges(state.index.ancestors_of(id));
        let descendants = state.live_edges(state.index.descendants_of(id));
        let path = state.live_categories(
            ancestors
                .iter()
                .map(|e| e.ancestor_id)
                .chain(std::iter::once(id)),
        );
        Ok(Some(Lineage {
            category,
            ancestors,
            descendants,
            path,
        }))
    }

    async fn edge_exists(&self, ancestor: CategoryId, descendant: CategoryId) -> AppResult<bool> {
        Ok(self.snapshot().await.index.exists_edge(ancestor, descendant))
    }

    async fn closure_rows(&self) -> AppResult<Vec<ClosureEdge>> {
        Ok(self.snapshot().await.index.edges())
    }

    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category> {
        self.mutate("create category", |state, now| {
            if let Some(parent) = data.parent_id {
                state.store.get_live(parent).map_err(|_| {
                    AppError::not_found(format!("Parent category {parent} not found"))
                })?;
            }
            let category = state.store.create(data, now)?;
            state.index.insert_under_parent(category.id, data.parent_id)?;
            Ok(category)
        })
        .await
    }

    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> AppResult<Category> {
        self.mutate("update category", |state, now| state.store.update(id, patch, now))
            .await
    }

    async fn move_subtree(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<MoveOutcome> {
        self.mutate("move category", |state, _now| {
            state.store.get_live(id)?;
            if let Some(parent) = new_parent {
                state.store.get_live(parent).map_err(|_| {
                    AppError::not_found(format!("Target parent category {parent} not found"))
                })?;
            }
            let old_parent_id = state.index.parent_of(id);
            let subtree_size = state.index.descendant_set(id).len() as u64;
            let delta = state.index.move_subtree(id, new_parent)?;
            Ok(MoveOutcome {
                category_id: id,
                old_parent_id,
                new_parent_id: new_parent,
                subtree_size,
                edges_removed: delta.removed,
                edges_inserted: delta.inserted,
            })
        })
        .await
    }

    async fn delete_category(
        &self,
        id: CategoryId,
        policy: DeletePolicy,
    ) -> AppResult<DeleteOutcome> {
        let assignments = self.assignments.as_ref();
        self.mutate("delete category", |state, now| {
            state.delete_one(assignments, id, policy, now)
        })
        .await
    }

    async fn delete_categories(
        &self,
        ids: &[CategoryId],
        policy: DeletePolicy,
    ) -> AppResult<Vec<DeleteOutcome>> {
        let assignments = self.assignments.as_ref();
        self.mutate("delete categories", |state, now| {
            for id in ids {
                state.store.get_live(*id)?;
            }
            let mut outcomes = Vec::with_capacity(ids.len());
            for id in ids {
                if state.is_live(*id) {
                    outcomes.push(state.delete_one(assignments, *id, policy, now)?);
                }
            }
            Ok(outcomes)
        })
        .await
    }

    async fn restore_category(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<Category> {
        self.mutate("restore category", |state, now| {
            if let Some(parent) = parent {
                state.store.get_live(parent).map_err(|_| {
                    AppError::not_found(format!("Parent category {parent} not found"))
                })?;
            }
            let category = state.store.restore(id, now)?;
            state.index.insert_under_parent(id, parent)?;
            Ok(category)
        })
        .await
    }

    async fn purge_categories(&self, ids: &[CategoryId]) -> AppResult<PurgeOutcome> {
        let operation = "purge categories";
        let _guard = self.lock(operation).await?;
        let purged = self
            .publish(operation, |state, _now| {
                ids.iter().map(|id| state.store.purge(*id)).collect::<AppResult<Vec<_>>>()
            })
            .await?;
        let assignments_removed = purged
            .iter()
            .map(|c| self.assignments.remove_category(c.id))
            .sum();
        Ok(PurgeOutcome {
            purged,
            assignments_removed,
        })
    }

    async fn assign_document(&self, document: DocumentId, category: CategoryId) -> AppResult<bool> {
        let _guard = self.lock("assign document").await?;
        self.require_live(category).await?;
        Ok(self.assignments.insert(document, category))
    }

    async fn unassign_document(
        &self,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        let _guard = self.lock("unassign document").await?;
        self.require_live(category).await?;
        Ok(self.assignments.remove(document, category))
    }

    async fn verify_integrity(&self) -> AppResult<IntegrityReport> {
        Ok(self.snapshot().await.integrity())
    }
}
