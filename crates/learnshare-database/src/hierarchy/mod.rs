//! Storage seam for the category hierarchy.
//!
//! A [`HierarchyBackend`] owns the category rows together with their
//! closure index and applies every topology change atomically: either all
//! rows of an operation are visible to readers or none are.

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use learnshare_core::config::{AppConfig, BackendKind};
use learnshare_core::result::AppResult;
use learnshare_core::traits::AssignmentSource;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_entity::category::{
    Category, CategoryPatch, ClosureEdge, CreateCategory, DeleteOutcome, IntegrityReport,
    ListScope, MoveOutcome, PurgeOutcome,
};

use crate::connection::DatabasePool;
use crate::memory::MemoryAssignments;
use crate::repositories::DocumentCategoryRepository;

pub use self::memory::MemoryHierarchy;
pub use self::postgres::PgHierarchy;

/// Live categories and the parent links between them, read from one
/// snapshot of the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyView {
    /// Live categories, ordered by id.
    pub categories: Vec<Category>,
    /// Level-1 rows whose both ends are in `categories`.
    pub links: Vec<ClosureEdge>,
}

impl HierarchyView {
    /// Whether the view holds no category.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// A live category with its closure rows in both directions, read from
/// one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    /// The category itself.
    pub category: Category,
    /// Live proper ancestors, nearest first.
    pub ancestors: Vec<ClosureEdge>,
    /// The category and its live descendants, shallowest first.
    pub descendants: Vec<ClosureEdge>,
    /// The category and its live ancestors, ordered by id.
    pub path: Vec<Category>,
}

/// Category rows plus closure index behind one transactional boundary.
///
/// Closure reads only report rows whose both ends are live categories.
/// Reads that combine categories with closure rows come from a single
/// snapshot, so a concurrent mutation is either fully visible or not at
/// all.
#[async_trait]
pub trait HierarchyBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Any category, live or soft-deleted.
    async fn find_category(&self, id: CategoryId) -> AppResult<Option<Category>>;

    /// The live category owning `slug`.
    async fn find_live_by_slug(&self, slug: &str) -> AppResult<Option<Category>>;

    /// Categories in `scope`, ordered by id.
    async fn list_categories(&self, scope: ListScope) -> AppResult<Vec<Category>>;

    /// Every live category and parent link.
    async fn load_forest(&self) -> AppResult<HierarchyView>;

    /// The live members of `id`'s subtree and the parent links among them.
    ///
    /// Empty when `id` is unknown or soft-deleted.
    async fn load_subtree(&self, id: CategoryId) -> AppResult<HierarchyView>;

    /// `id` with its ancestors and descendants; `None` unless `id` is live.
    async fn load_lineage(&self, id: CategoryId) -> AppResult<Option<Lineage>>;

    /// Whether `(ancestor, descendant, level ≥ 0)` exists.
    async fn edge_exists(&self, ancestor: CategoryId, descendant: CategoryId) -> AppResult<bool>;

    /// Raw closure rows, unfiltered.
    async fn closure_rows(&self) -> AppResult<Vec<ClosureEdge>>;

    /// Insert a category and index it under `data.parent_id`.
    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category>;

    /// Change display attributes; topology is untouched.
    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> AppResult<Category>;

    /// Reattach a subtree under a new parent, or make it a root.
    async fn move_subtree(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<MoveOutcome>;

    /// Soft-delete a category under `policy`.
    ///
    /// `BlockIfNonempty` refuses a category with children or with direct
    /// document assignments; both are checked under the hierarchy lock.
    async fn delete_category(&self, id: CategoryId, policy: DeletePolicy)
    -> AppResult<DeleteOutcome>;

    /// Soft-delete several categories as one operation.
    ///
    /// Every id must be live when the operation starts. Ids are then
    /// deleted in order; one already removed by an earlier cascade in the
    /// same call is skipped. Any failure leaves the hierarchy untouched.
    async fn delete_categories(
        &self,
        ids: &[CategoryId],
        policy: DeletePolicy,
    ) -> AppResult<Vec<DeleteOutcome>>;

    /// Bring a soft-deleted category back as a root or under `parent`.
    async fn restore_category(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<Category>;

    /// Permanently remove soft-deleted categories and their assignments.
    ///
    /// All or nothing: an unknown or live id aborts the whole call.
    async fn purge_categories(&self, ids: &[CategoryId]) -> AppResult<PurgeOutcome>;

    /// Attach a document to a live category under the hierarchy lock.
    async fn assign_document(&self, document: DocumentId, category: CategoryId) -> AppResult<bool>;

    /// Detach a document from a live category under the hierarchy lock.
    async fn unassign_document(
        &self,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool>;

    /// Run the full integrity check over the committed state.
    async fn verify_integrity(&self) -> AppResult<IntegrityReport>;
}

/// Backend options shared by both engines.
#[derive(Debug, Clone, Copy)]
pub struct BackendOptions {
    /// How long a mutation waits for the hierarchy lock.
    pub lock_timeout: Duration,
    /// Check every invariant before committing a mutation.
    pub verify_invariants: bool,
}

impl BackendOptions {
    /// Options taken from the `[hierarchy]` section.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lock_timeout: Duration::from_millis(config.hierarchy.lock_timeout_ms),
            verify_invariants: config.hierarchy.verify_invariants,
        }
    }
}

/// The hierarchy backend and the assignment collaborator it pairs with.
#[derive(Debug, Clone)]
pub struct HierarchyStores {
    /// Category rows and closure index.
    pub hierarchy: Arc<dyn HierarchyBackend>,
    /// Document assignments.
    pub assignments: Arc<dyn AssignmentSource>,
    /// Pool behind the Postgres engine.
    pub pool: Option<DatabasePool>,
}

impl HierarchyStores {
    /// Open the engine selected by `hierarchy.backend`.
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        let options = BackendOptions::from_config(config);
        info!(backend = %config.hierarchy.backend, "Opening category hierarchy store");
        match config.hierarchy.backend {
            BackendKind::Postgres => {
                let db = DatabasePool::connect(&config.database).await?;
                Ok(Self::postgres(db, options))
            }
            BackendKind::Memory => Ok(Self::memory(options)),
        }
    }

    /// Stores over an open Postgres pool.
    pub fn postgres(db: DatabasePool, options: BackendOptions) -> Self {
        let pool = db.pool().clone();
        Self {
            hierarchy: Arc::new(PgHierarchy::new(pool.clone(), options)),
            assignments: Arc::new(DocumentCategoryRepository::new(pool)),
            pool: Some(db),
        }
    }

    /// Fresh process-local stores.
    ///
    /// The hierarchy and the assignment source share one table, so the
    /// hierarchy can check and change assignments under its writer lock.
    pub fn memory(options: BackendOptions) -> Self {
        let assignments = Arc::new(MemoryAssignments::new());
        Self {
            hierarchy: Arc::new(MemoryHierarchy::new(Arc::clone(&assignments), options)),
            assignments,
            pool: None,
        }
    }
}
