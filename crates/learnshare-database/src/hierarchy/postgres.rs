//! PostgreSQL hierarchy backend.
//!
//! Every mutation runs in one transaction that first takes a
//! transaction-scoped advisory lock, so topology changes are serialized
//! across all processes sharing the database. `lock_timeout` bounds the
//! wait; an expired wait surfaces as a retryable conflict.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error};

use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_entity::category::{
    Category, CategoryPatch, ClosureEdge, CreateCategory, DeleteOutcome, IntegrityReport,
    ListScope, MoveOutcome, PurgeOutcome,
};

use super::{BackendOptions, HierarchyBackend, HierarchyView, Lineage};
use crate::error::map_sqlx;
use crate::integrity;
use crate::repositories::{CategoryRepository, ClosureRepository, DocumentCategoryRepository};

/// Advisory lock key guarding the category hierarchy ("LSCAT").
const HIERARCHY_LOCK_KEY: i64 = 0x4C53_4341_5400_0001;

/// Category hierarchy stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgHierarchy {
    pool: PgPool,
    categories: CategoryRepository,
    closure: ClosureRepository,
    options: BackendOptions,
}

impl PgHierarchy {
    /// Create a backend over `pool`.
    pub fn new(pool: PgPool, options: BackendOptions) -> Self {
        Self {
            categories: CategoryRepository::new(pool.clone()),
            closure: ClosureRepository::new(pool.clone()),
            pool,
            options,
        }
    }

    /// Open a transaction holding the hierarchy lock.
    async fn begin(&self, operation: &str) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx("Failed to begin transaction", e))?;

        // SET does not accept bind parameters; the value is an integer.
        let timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.options.lock_timeout.as_millis()
        );
        sqlx::query(&timeout)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("Failed to set lock timeout", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(HIERARCHY_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(operation, e))?;

        debug!(operation, "Acquired category hierarchy lock");
        Ok(tx)
    }

    /// Verify the uncommitted state when invariant checks are enabled.
    async fn verify(&self, conn: &mut PgConnection, operation: &str) -> AppResult<()> {
        if !self.options.verify_invariants {
            return Ok(());
        }
        let report = integrity_in(conn).await?;
        if report.is_consistent() {
            return Ok(());
        }
        error!(operation, summary = %report.summary(), "Mutation would corrupt the closure index");
        Err(AppError::consistency(format!(
            "{operation} rejected: {}",
            report.summary()
        )))
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
        tx.commit()
            .await
            .map_err(|e| map_sqlx("Failed to commit transaction", e))
    }

    /// Open a read-only transaction whose statements all see one snapshot.
    async fn begin_snapshot(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx("Failed to begin transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("Failed to set isolation level", e))?;
        Ok(tx)
    }
}

async fn integrity_in(conn: &mut PgConnection) -> AppResult<IntegrityReport> {
    let live = CategoryRepository::live_ids_in(conn).await?;
    let rows = ClosureRepository::all_rows_in(conn).await?;
    Ok(integrity::check(&live, &rows))
}

async fn require_parent(conn: &mut PgConnection, parent: Option<CategoryId>) -> AppResult<()> {
    if let Some(parent) = parent {
        CategoryRepository::require_live_in(conn, parent)
            .await
            .map_err(|_| AppError::not_found(format!("Parent category {parent} not found")))?;
    }
    Ok(())
}

/// Soft-delete one live category under `policy` on the locked transaction.
async fn delete_in(
    conn: &mut PgConnection,
    id: CategoryId,
    policy: DeletePolicy,
) -> AppResult<DeleteOutcome> {
    CategoryRepository::require_live_in(conn, id).await?;

    let outcome = match policy {
        DeletePolicy::BlockIfNonempty => {
            let children = ClosureRepository::child_ids_in(conn, id).await?;
            if !children.is_empty() {
                return Err(AppError::conflict(format!(
                    "Category {id} still has {} subcategories",
                    children.len()
                )));
            }
            let documents = DocumentCategoryRepository::count_in(conn, &[id]).await?;
            if documents > 0 {
                return Err(AppError::conflict(format!(
                    "Category {id} still has {documents} documents"
                )));
            }
            let edges_removed = ClosureRepository::detach_in(conn, id).await?;
            CategoryRepository::soft_delete_in(conn, &[id]).await?;
            DeleteOutcome {
                policy,
                deleted: vec![id],
                promoted: Vec::new(),
                edges_removed,
            }
        }
        DeletePolicy::Cascade => {
            let members = ClosureRepository::descendant_ids_in(conn, id).await?;
            let edges_removed = ClosureRepository::remove_members_in(conn, &members).await?;
            CategoryRepository::soft_delete_in(conn, &members).await?;
            DeleteOutcome {
                policy,
                deleted: members,
                promoted: Vec::new(),
                edges_removed,
            }
        }
        DeletePolicy::PromoteChildren => {
            let grandparent = ClosureRepository::parent_of_in(conn, id).await?;
            let children = ClosureRepository::child_ids_in(conn, id).await?;
            let mut edges_removed = 0;
            for child in &children {
                edges_removed += ClosureRepository::move_subtree_in(conn, *child, grandparent)
                    .await?
                    .removed;
            }
            edges_removed += ClosureRepository::detach_in(conn, id).await?;
            CategoryRepository::soft_delete_in(conn, &[id]).await?;
            DeleteOutcome {
                policy,
                deleted: vec![id],
                promoted: children,
                edges_removed,
            }
        }
    };
    Ok(outcome)
}

#[async_trait]
impl HierarchyBackend for PgHierarchy {
    async fn find_category(&self, id: CategoryId) -> AppResult<Option<Category>> {
        self.categories.find_by_id(id).await
    }

    async fn find_live_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        self.categories.find_live_by_slug(slug).await
    }

    async fn list_categories(&self, scope: ListScope) -> AppResult<Vec<Category>> {
        self.categories.list(scope).await
    }

    async fn load_forest(&self) -> AppResult<HierarchyView> {
        let mut tx = self.begin_snapshot().await?;
        let categories = CategoryRepository::list_in(&mut tx, ListScope::Live).await?;
        let links = ClosureRepository::parent_links_in(&mut tx).await?;
        Self::commit(tx).await?;
        Ok(HierarchyView { categories, links })
    }

    async fn load_subtree(&self, id: CategoryId) -> AppResult<HierarchyView> {
        let mut tx = self.begin_snapshot().await?;
        let members: Vec<CategoryId> = ClosureRepository::descendants_of_in(&mut tx, id)
            .await?
            .into_iter()
            .map(|e| e.descendant_id)
            .collect();
        if members.is_empty() {
            Self::commit(tx).await?;
            return Ok(HierarchyView::default());
        }
        let categories = CategoryRepository::find_live_by_ids_in(&mut tx, &members).await?;
        let links = ClosureRepository::subtree_links_in(&mut tx, id).await?;
        Self::commit(tx).await?;
        Ok(HierarchyView { categories, links })
    }

    async fn load_lineage(&self, id: CategoryId) -> AppResult<Option<Lineage>> {
        let mut tx = self.begin_snapshot().await?;
        let Some(category) = CategoryRepository::find_in(&mut tx, id)
            .await?
            .filter(Category::is_live)
        else {
            Self::commit(tx).await?;
            return Ok(None);
        };
        let ancestors = ClosureRepository::ancestors_of_in(&mut tx, id).await?;
        let descendants = ClosureRepository::descendants_of_in(&mut tx, id).await?;
        let mut path_ids: Vec<CategoryId> = ancestors.iter().map(|e| e.ancestor_id).collect();
        path_ids.push(id);
        let path = CategoryRepository::find_live_by_ids_in(&mut tx, &path_ids).await?;
        Self::commit(tx).await?;
        Ok(Some(Lineage {
            category,
            ancestors,
            descendants,
            path,
        }))
    }

    async fn edge_exists(&self, ancestor: CategoryId, descendant: CategoryId) -> AppResult<bool> {
        self.closure.edge_exists(ancestor, descendant).await
    }

    async fn closure_rows(&self) -> AppResult<Vec<ClosureEdge>> {
        self.closure.all_rows().await
    }

    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category> {
        let operation = "create category";
        let mut tx = self.begin(operation).await?;

        require_parent(&mut tx, data.parent_id).await?;
        let category = CategoryRepository::insert_in(&mut tx, data).await?;
        ClosureRepository::insert_under_parent_in(&mut tx, category.id, data.parent_id).await?;

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(category)
    }

    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> AppResult<Category> {
        self.categories.update(id, patch).await
    }

    async fn move_subtree(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<MoveOutcome> {
        let operation = "move category";
        let mut tx = self.begin(operation).await?;

        CategoryRepository::require_live_in(&mut tx, id).await?;
        if let Some(parent) = new_parent {
            CategoryRepository::require_live_in(&mut tx, parent)
                .await
                .map_err(|_| {
                    AppError::not_found(format!("Target parent category {parent} not found"))
                })?;
            if ClosureRepository::edge_exists_in(&mut tx, id, parent).await? {
                return Err(AppError::cycle(format!(
                    "Category {id} cannot be moved under itself or its descendant {parent}"
                )));
            }
        }

        let old_parent_id = ClosureRepository::parent_of_in(&mut tx, id).await?;
        let subtree_size = ClosureRepository::descendant_ids_in(&mut tx, id).await?.len() as u64;
        let delta = ClosureRepository::move_subtree_in(&mut tx, id, new_parent).await?;

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(MoveOutcome {
            category_id: id,
            old_parent_id,
            new_parent_id: new_parent,
            subtree_size,
            edges_removed: delta.removed,
            edges_inserted: delta.inserted,
        })
    }

    async fn delete_category(
        &self,
        id: CategoryId,
        policy: DeletePolicy,
    ) -> AppResult<DeleteOutcome> {
        let operation = "delete category";
        let mut tx = self.begin(operation).await?;
        let outcome = delete_in(&mut tx, id, policy).await?;

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(outcome)
    }

    async fn delete_categories(
        &self,
        ids: &[CategoryId],
        policy: DeletePolicy,
    ) -> AppResult<Vec<DeleteOutcome>> {
        let operation = "delete categories";
        let mut tx = self.begin(operation).await?;
        for id in ids {
            CategoryRepository::require_live_in(&mut tx, *id).await?;
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let live = CategoryRepository::find_in(&mut tx, *id)
                .await?
                .is_some_and(|c| c.is_live());
            if live {
                outcomes.push(delete_in(&mut tx, *id, policy).await?);
            }
        }

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(outcomes)
    }

    async fn restore_category(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<Category> {
        let operation = "restore category";
        let mut tx = self.begin(operation).await?;

        require_parent(&mut tx, parent).await?;
        let category = CategoryRepository::restore_in(&mut tx, id).await?;
        ClosureRepository::insert_under_parent_in(&mut tx, id, parent).await?;

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(category)
    }

    async fn purge_categories(&self, ids: &[CategoryId]) -> AppResult<PurgeOutcome> {
        let operation = "purge categories";
        let mut tx = self.begin(operation).await?;

        for id in ids {
            match CategoryRepository::find_in(&mut tx, *id).await? {
                None => return Err(AppError::not_found(format!("Category {id} not found"))),
                Some(c) if c.is_live() => {
                    return Err(AppError::conflict(format!("Category {id} is not deleted")));
                }
                Some(_) => {}
            }
        }
        // Assignment rows go with the category through ON DELETE CASCADE.
        let assignments_removed = DocumentCategoryRepository::count_in(&mut tx, ids).await?;
        let mut purged = Vec::with_capacity(ids.len());
        for id in ids {
            purged.push(CategoryRepository::purge_in(&mut tx, *id).await?);
        }

        self.verify(&mut tx, operation).await?;
        Self::commit(tx).await?;
        Ok(PurgeOutcome {
            purged,
            assignments_removed,
        })
    }

    async fn assign_document(&self, document: DocumentId, category: CategoryId) -> AppResult<bool> {
        let mut tx = self.begin("assign document").await?;
        CategoryRepository::require_live_in(&mut tx, category).await?;
        let added = DocumentCategoryRepository::assign_in(&mut tx, document, category).await?;
        Self::commit(tx).await?;
        Ok(added)
    }

    async fn unassign_document(
        &self,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        let mut tx = self.begin("unassign document").await?;
        CategoryRepository::require_live_in(&mut tx, category).await?;
        let removed = DocumentCategoryRepository::unassign_in(&mut tx, document, category).await?;
        Self::commit(tx).await?;
        Ok(removed)
    }

    async fn verify_integrity(&self) -> AppResult<IntegrityReport> {
        // Both scans must see the same snapshot.
        let mut tx = self.begin_snapshot().await?;
        let report = integrity_in(&mut tx).await?;
        Self::commit(tx).await?;
        Ok(report)
    }
}
