//! Category service tests over the in-memory hierarchy store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use learnshare_core::config::{AppConfig, BackendKind};
use learnshare_core::error::ErrorKind;
use learnshare_core::result::AppResult;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_database::hierarchy::{
    BackendOptions, HierarchyBackend, HierarchyStores, HierarchyView, Lineage,
};
use learnshare_entity::category::{
    Category, CategoryPatch, CategoryStatus, CategoryTreeNode, ClosureEdge, CreateCategory,
    DeleteOutcome, IntegrityReport, ListScope, MoveOutcome, PurgeOutcome,
};
use learnshare_service::{
    CategoryService, CreateCategoryRequest, TreeCache, UpdateCategoryRequest,
};

struct Harness {
    config: AppConfig,
    stores: HierarchyStores,
    service: CategoryService,
}

impl Harness {
    fn new() -> Self {
        let mut config = AppConfig::default();
        config.hierarchy.backend = BackendKind::Memory;
        let stores = HierarchyStores::memory(BackendOptions {
            lock_timeout: Duration::from_millis(500),
            verify_invariants: true,
        });
        let service = CategoryService::from_stores(&stores, &config);
        Self {
            config,
            stores,
            service,
        }
    }

    /// A second service over the same stores whose backend lets another
    /// writer commit at a chosen point.
    fn interleaved(&self, backend: Interleaving) -> CategoryService {
        CategoryService::new(
            Arc::new(backend),
            Arc::clone(&self.stores.assignments),
            Arc::new(TreeCache::new(&self.config.cache)),
            self.config.hierarchy.clone(),
        )
    }

    async fn create(&self, name: &str, parent: Option<i64>) -> CategoryId {
        self.service
            .create_category(CreateCategoryRequest::named(name, parent.map(CategoryId)))
            .await
            .expect("create category")
            .id
    }

    async fn closure(&self) -> BTreeSet<(i64, i64, i32)> {
        self.stores
            .hierarchy
            .closure_rows()
            .await
            .expect("closure rows")
            .into_iter()
            .map(|e| (e.ancestor_id.0, e.descendant_id.0, e.level))
            .collect()
    }

    async fn assert_consistent(&self) {
        let report = self.service.verify_integrity().await.unwrap();
        assert!(report.is_consistent(), "{}", report.summary());
    }
}

/// Delegates to another backend and commits a competing write mid-request.
#[derive(Debug)]
struct Interleaving {
    inner: Arc<dyn HierarchyBackend>,
    /// Cascade-delete this category just before the n-th read (1-based).
    cascade_before_read: Option<(CategoryId, usize)>,
    /// Attach this document right before a delete reaches the backend.
    assign_before_delete: Option<DocumentId>,
    reads: AtomicUsize,
}

impl Interleaving {
    fn over(h: &Harness) -> Self {
        Self {
            inner: Arc::clone(&h.stores.hierarchy),
            cascade_before_read: None,
            assign_before_delete: None,
            reads: AtomicUsize::new(0),
        }
    }

    fn cascade_before_read(mut self, id: CategoryId, read: usize) -> Self {
        self.cascade_before_read = Some((id, read));
        self
    }

    fn assign_before_delete(mut self, document: DocumentId) -> Self {
        self.assign_before_delete = Some(document);
        self
    }

    async fn before_read(&self) {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((id, at)) = self.cascade_before_read {
            if read == at {
                self.inner
                    .delete_category(id, DeletePolicy::Cascade)
                    .await
                    .expect("competing delete");
            }
        }
    }
}

#[async_trait]
impl HierarchyBackend for Interleaving {
    async fn find_category(&self, id: CategoryId) -> AppResult<Option<Category>> {
        self.before_read().await;
        self.inner.find_category(id).await
    }

    async fn find_live_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        self.before_read().await;
        self.inner.find_live_by_slug(slug).await
    }

    async fn list_categories(&self, scope: ListScope) -> AppResult<Vec<Category>> {
        self.before_read().await;
        self.inner.list_categories(scope).await
    }

    async fn load_forest(&self) -> AppResult<HierarchyView> {
        self.before_read().await;
        self.inner.load_forest().await
    }

    async fn load_subtree(&self, id: CategoryId) -> AppResult<HierarchyView> {
        self.before_read().await;
        self.inner.load_subtree(id).await
    }

    async fn load_lineage(&self, id: CategoryId) -> AppResult<Option<Lineage>> {
        self.before_read().await;
        self.inner.load_lineage(id).await
    }

    async fn edge_exists(&self, ancestor: CategoryId, descendant: CategoryId) -> AppResult<bool> {
        self.before_read().await;
        self.inner.edge_exists(ancestor, descendant).await
    }

    async fn closure_rows(&self) -> AppResult<Vec<ClosureEdge>> {
        self.inner.closure_rows().await
    }

    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category> {
        self.inner.create_category(data).await
    }

    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> AppResult<Category> {
        self.inner.update_category(id, patch).await
    }

    async fn move_subtree(
        &self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<MoveOutcome> {
        self.inner.move_subtree(id, new_parent).await
    }

    async fn delete_category(
        &self,
        id: CategoryId,
        policy: DeletePolicy,
    ) -> AppResult<DeleteOutcome> {
        if let Some(document) = self.assign_before_delete {
            self.inner
                .assign_document(document, id)
                .await
                .expect("competing assignment");
        }
        self.inner.delete_category(id, policy).await
    }

    async fn delete_categories(
        &self,
        ids: &[CategoryId],
        policy: DeletePolicy,
    ) -> AppResult<Vec<DeleteOutcome>> {
        self.inner.delete_categories(ids, policy).await
    }

    async fn restore_category(
        &self,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<Category> {
        self.inner.restore_category(id, parent).await
    }

    async fn purge_categories(&self, ids: &[CategoryId]) -> AppResult<PurgeOutcome> {
        self.inner.purge_categories(ids).await
    }

    async fn assign_document(&self, document: DocumentId, category: CategoryId) -> AppResult<bool> {
        self.inner.assign_document(document, category).await
    }

    async fn unassign_document(
        &self,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        self.inner.unassign_document(document, category).await
    }

    async fn verify_integrity(&self) -> AppResult<IntegrityReport> {
        self.inner.verify_integrity().await
    }
}

fn rows(rows: &[(i64, i64, i32)]) -> BTreeSet<(i64, i64, i32)> {
    rows.iter().copied().collect()
}

fn names(nodes: &[CategoryTreeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

/// A(1) → B(2) → C(3), D(4)
async fn scenario_abcd(h: &Harness) {
    h.create("A", None).await;
    h.create("B", Some(1)).await;
    h.create("C", Some(2)).await;
    h.create("D", None).await;
}

#[tokio::test]
async fn test_create_builds_closure_rows() {
    let h = Harness::new();

    assert_eq!(h.create("A", None).await, CategoryId(1));
    assert_eq!(h.closure().await, rows(&[(1, 1, 0)]));

    assert_eq!(h.create("B", Some(1)).await, CategoryId(2));
    assert_eq!(h.closure().await, rows(&[(1, 1, 0), (2, 2, 0), (1, 2, 1)]));

    h.create("C", Some(2)).await;
    assert_eq!(
        h.closure().await,
        rows(&[(1, 1, 0), (2, 2, 0), (1, 2, 1), (3, 3, 0), (2, 3, 1), (1, 3, 2)])
    );

    let tree = h
        .service
        .get_subcategories_tree(CategoryId(1), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.name, "A");
    assert_eq!(names(&tree.children), ["B"]);
    assert_eq!(names(&tree.children[0].children), ["C"]);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_move_rewrites_subtree_rows() {
    let h = Harness::new();
    scenario_abcd(&h).await;

    let outcome = h
        .service
        .move_category(CategoryId(2), Some(CategoryId(4)))
        .await
        .unwrap();
    assert_eq!(outcome.old_parent_id, Some(CategoryId(1)));
    assert_eq!(outcome.new_parent_id, Some(CategoryId(4)));
    assert_eq!(outcome.subtree_size, 2);
    assert_eq!(outcome.edges_removed, 2);
    assert_eq!(outcome.edges_inserted, 2);

    assert_eq!(
        h.closure().await,
        rows(&[(1, 1, 0), (4, 4, 0), (2, 2, 0), (4, 2, 1), (3, 3, 0), (2, 3, 1), (4, 3, 2)])
    );

    let crumbs: Vec<String> = h
        .service
        .get_breadcrumb(CategoryId(3))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(crumbs, ["D", "B", "C"]);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_move_under_own_descendant_is_cycle() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    h.service
        .move_category(CategoryId(2), Some(CategoryId(4)))
        .await
        .unwrap();
    let before = h.closure().await;

    let err = h
        .service
        .move_category(CategoryId(2), Some(CategoryId(3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cycle);

    let err = h
        .service
        .move_category(CategoryId(4), Some(CategoryId(4)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cycle);
    assert_eq!(h.closure().await, before);
}

#[tokio::test]
async fn test_move_errors_leave_rows_untouched() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    let before = h.closure().await;

    let err = h
        .service
        .move_category(CategoryId(2), Some(CategoryId(99)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = h.service.move_category(CategoryId(99), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(h.closure().await, before);

    // Moving a subtree to the root level drops every external ancestor row.
    h.service.move_category(CategoryId(2), None).await.unwrap();
    assert_eq!(
        h.closure().await,
        rows(&[(1, 1, 0), (4, 4, 0), (2, 2, 0), (3, 3, 0), (2, 3, 1)])
    );
}

#[tokio::test]
async fn test_block_delete_refuses_nonempty_category() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    let before = h.closure().await;

    let err = h
        .service
        .delete_category(CategoryId(2), Some(DeletePolicy::BlockIfNonempty))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(h.closure().await, before);

    // A leaf with documents is blocked as well.
    h.service
        .assign_document(DocumentId(10), CategoryId(3))
        .await
        .unwrap();
    let err = h
        .service
        .delete_category(CategoryId(3), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let outcome = h
        .service
        .delete_category(CategoryId(4), None)
        .await
        .unwrap();
    assert_eq!(outcome.deleted, vec![CategoryId(4)]);
    assert_eq!(outcome.edges_removed, 1);
}

#[tokio::test]
async fn test_cascade_delete_hides_whole_subtree() {
    let h = Harness::new();
    scenario_abcd(&h).await;

    let outcome = h
        .service
        .delete_category(CategoryId(1), Some(DeletePolicy::Cascade))
        .await
        .unwrap();
    let deleted: BTreeSet<CategoryId> = outcome.deleted.into_iter().collect();
    assert_eq!(
        deleted,
        BTreeSet::from([CategoryId(1), CategoryId(2), CategoryId(3)])
    );
    assert_eq!(outcome.edges_removed, 6);
    assert_eq!(h.closure().await, rows(&[(4, 4, 0)]));

    let roots: Vec<String> = h
        .service
        .get_root_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(roots, ["D"]);
    assert!(
        h.service
            .get_subcategories_tree(CategoryId(2), None)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(h.service.get_deleted_categories().await.unwrap().len(), 3);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_promote_delete_lifts_children() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    h.create("E", Some(2)).await;

    let outcome = h
        .service
        .delete_category(CategoryId(2), Some(DeletePolicy::PromoteChildren))
        .await
        .unwrap();
    assert_eq!(outcome.deleted, vec![CategoryId(2)]);
    let promoted: BTreeSet<CategoryId> = outcome.promoted.into_iter().collect();
    assert_eq!(promoted, BTreeSet::from([CategoryId(3), CategoryId(5)]));

    let children: Vec<String> = h
        .service
        .get_children(CategoryId(1))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(children, ["C", "E"]);
    assert!(h.closure().await.contains(&(1, 3, 1)));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_restore_and_purge() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    h.service
        .delete_category(CategoryId(2), Some(DeletePolicy::Cascade))
        .await
        .unwrap();

    // Live categories are not restorable; purging needs a soft delete.
    let err = h.service.restore_category(CategoryId(1), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = h.service.purge_category(CategoryId(1)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let restored = h
        .service
        .restore_category(CategoryId(2), Some(CategoryId(4)))
        .await
        .unwrap();
    assert!(restored.is_live());
    assert!(h.closure().await.contains(&(4, 2, 1)));

    let report = h.service.restore_categories(&[CategoryId(3), CategoryId(99)]).await;
    assert_eq!(report.succeeded, vec![CategoryId(3)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, ErrorKind::NotFound);

    h.service
        .delete_category(CategoryId(4), Some(DeletePolicy::Cascade))
        .await
        .unwrap();
    h.service.purge_category(CategoryId(4)).await.unwrap();
    let err = h.service.purge_category(CategoryId(4)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_bulk_delete_is_all_or_nothing() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    let before = h.closure().await;

    // B still has C when its turn comes; D must survive the failure.
    let err = h
        .service
        .delete_categories(&[CategoryId(4), CategoryId(2), CategoryId(3)], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(h.closure().await, before);

    let err = h
        .service
        .delete_categories(&[CategoryId(4), CategoryId(99)], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(h.service.get_root_categories().await.unwrap().len(), 2);

    let outcomes = h
        .service
        .delete_categories(&[CategoryId(3), CategoryId(2), CategoryId(4), CategoryId(3)], None)
        .await
        .unwrap();
    let deleted: Vec<CategoryId> = outcomes.into_iter().flat_map(|o| o.deleted).collect();
    assert_eq!(deleted, vec![CategoryId(3), CategoryId(2), CategoryId(4)]);
    assert_eq!(h.closure().await, rows(&[(1, 1, 0)]));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_bulk_purge_is_all_or_nothing() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    h.service
        .assign_document(DocumentId(5), CategoryId(3))
        .await
        .unwrap();
    h.service
        .delete_category(CategoryId(1), Some(DeletePolicy::Cascade))
        .await
        .unwrap();

    let err = h
        .service
        .purge_categories(&[CategoryId(1), CategoryId(4)])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    let err = h
        .service
        .purge_categories(&[CategoryId(1), CategoryId(99)])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(h.service.get_deleted_categories().await.unwrap().len(), 3);

    let outcome = h
        .service
        .purge_categories(&[CategoryId(1), CategoryId(2), CategoryId(3), CategoryId(2)])
        .await
        .unwrap();
    assert_eq!(outcome.purged.len(), 3);
    assert_eq!(outcome.assignments_removed, 1);
    assert!(h.service.get_deleted_categories().await.unwrap().is_empty());
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_reads_never_mix_states_around_a_concurrent_delete() {
    for read in 1..=3 {
        // A(1) → B(2) → C(3); B is cascade-deleted mid-request.
        let h = Harness::new();
        h.create("A", None).await;
        h.create("B", Some(1)).await;
        h.create("C", Some(2)).await;

        let service = h.interleaved(Interleaving::over(&h).cascade_before_read(CategoryId(2), read));
        let roots: Vec<String> = service
            .get_root_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(roots, ["A"], "competing delete before read {read}");
    }

    for read in 1..=3 {
        let h = Harness::new();
        h.create("A", None).await;
        h.create("B", Some(1)).await;
        h.create("C", Some(2)).await;

        let service = h.interleaved(Interleaving::over(&h).cascade_before_read(CategoryId(2), read));
        let tree = service
            .get_subcategories_tree(CategoryId(1), None)
            .await
            .unwrap()
            .unwrap();
        // Either the whole chain or A alone, never a partial view.
        assert!(
            tree.len() == 3 || tree.len() == 1,
            "competing delete before read {read}: {} nodes",
            tree.len()
        );
        if tree.len() == 3 {
            assert_eq!(names(&tree.children), ["B"]);
            assert_eq!(names(&tree.children[0].children), ["C"]);
        }
    }

    for read in 1..=2 {
        let h = Harness::new();
        h.create("A", None).await;
        h.create("B", Some(1)).await;
        h.create("C", Some(2)).await;

        let service = h.interleaved(Interleaving::over(&h).cascade_before_read(CategoryId(2), read));
        let picker = service.get_picker_tree().await.unwrap();
        assert_eq!(names(&picker), ["A"], "competing delete before read {read}");
        // C is never shown without B.
        for child in &picker[0].children {
            assert_eq!(child.name, "B");
        }
    }
}

#[tokio::test]
async fn test_block_delete_sees_assignment_that_lands_after_the_precheck() {
    let h = Harness::new();
    scenario_abcd(&h).await;

    let service = h.interleaved(Interleaving::over(&h).assign_before_delete(DocumentId(77)));
    let err = service
        .delete_category(CategoryId(3), Some(DeletePolicy::BlockIfNonempty))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let leaf = h.service.get_category(CategoryId(3)).await.unwrap();
    assert_eq!(leaf.document_count, 1);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_update_can_clear_description() {
    let h = Harness::new();
    let id = h
        .service
        .create_category(CreateCategoryRequest {
            description: Some("Forces and motion".to_string()),
            ..CreateCategoryRequest::named("Mechanics", None)
        })
        .await
        .unwrap()
        .id;

    let kept = h.service.rename_category(id, "Classical Mechanics").await.unwrap();
    assert_eq!(kept.description.as_deref(), Some("Forces and motion"));

    let cleared = h
        .service
        .update_category(
            id,
            UpdateCategoryRequest {
                clear_description: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.name, "Classical Mechanics");
}

#[tokio::test]
async fn test_create_validation() {
    let h = Harness::new();
    h.create("Physics", None).await;

    let err = h
        .service
        .create_category(CreateCategoryRequest::named("  ", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    // Same generated slug as the existing root.
    let err = h
        .service
        .create_category(CreateCategoryRequest::named("physics", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = h
        .service
        .create_category(CreateCategoryRequest::named("Optics", Some(CategoryId(42))))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(h.closure().await, rows(&[(1, 1, 0)]));
}

#[tokio::test]
async fn test_slug_is_generated_and_renames_keep_it() {
    let h = Harness::new();
    let id = h.create("Quantum Physics", None).await;

    let renamed = h.service.rename_category(id, "  Quantum Mechanics ").await.unwrap();
    assert_eq!(renamed.name, "Quantum Mechanics");
    assert_eq!(renamed.slug, "quantum-physics");

    let toggled = h.service.toggle_status(id).await.unwrap();
    assert_eq!(toggled.status, CategoryStatus::Inactive);

    let err = h
        .service
        .update_category(
            id,
            UpdateCategoryRequest {
                slug: Some("Bad Slug".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_children_and_roots_follow_display_order() {
    let h = Harness::new();
    let science = h.create("Science", None).await;
    h.create("Arts", None).await;
    let physics = h.create("Physics", Some(science.0)).await;
    h.create("Chemistry", Some(science.0)).await;
    h.create("Biology", Some(science.0)).await;
    h.service.reorder(physics, -1).await.unwrap();

    let children: Vec<String> = h
        .service
        .get_children(science)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(children, ["Physics", "Biology", "Chemistry"]);

    let roots = h.service.get_root_categories().await.unwrap();
    assert_eq!(roots[0].name, "Arts");
    assert_eq!(roots[1].subcategory_count, 3);

    let dto = h.service.get_category(physics).await.unwrap();
    assert_eq!(dto.parent_id, Some(science));
    assert_eq!(dto.level, 1);
    assert!(h.service.get_children(CategoryId(99)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subtree_depth_limit() {
    let h = Harness::new();
    scenario_abcd(&h).await;

    let root_only = h
        .service
        .get_subcategories_tree(CategoryId(1), Some(0))
        .await
        .unwrap()
        .unwrap();
    assert!(root_only.children.is_empty());

    let one_level = h
        .service
        .get_subcategories_tree(CategoryId(1), Some(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one_level.len(), 2);

    assert!(
        h.service
            .get_subcategories_tree(CategoryId(99), None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_document_counts_are_distinct_over_subtree() {
    let h = Harness::new();
    scenario_abcd(&h).await;
    let svc = &h.service;

    svc.assign_document(DocumentId(1), CategoryId(1)).await.unwrap();
    svc.assign_document(DocumentId(1), CategoryId(3)).await.unwrap();
    svc.assign_document(DocumentId(2), CategoryId(3)).await.unwrap();
    assert!(!svc.assign_document(DocumentId(2), CategoryId(3)).await.unwrap());

    assert_eq!(svc.document_count(CategoryId(1)).await.unwrap(), 2);
    assert_eq!(svc.document_count(CategoryId(2)).await.unwrap(), 2);
    assert_eq!(svc.get_category(CategoryId(1)).await.unwrap().document_count, 2);

    let tree = svc
        .get_subcategories_tree(CategoryId(1), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.document_count, 2);
    assert_eq!(tree.children[0].document_count, 2);

    svc.unassign_document(DocumentId(2), CategoryId(3)).await.unwrap();
    assert_eq!(svc.document_count(CategoryId(2)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_assignment_requires_live_category() {
    let h = Harness::new();
    let id = h.create("Archive", None).await;
    h.service.delete_category(id, None).await.unwrap();

    let err = h
        .service
        .assign_document(DocumentId(1), id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_picker_shows_active_branches_only() {
    let h = Harness::new();
    let science = h.create("Science", None).await;
    let arts = h.create("Arts", None).await;
    let physics = h.create("Physics", Some(science.0)).await;
    let chemistry = h.create("Chemistry", Some(science.0)).await;
    h.create("Optics", Some(physics.0)).await;
    h.service
        .update_status(chemistry, CategoryStatus::Inactive)
        .await
        .unwrap();
    h.service.update_status(arts, CategoryStatus::Inactive).await.unwrap();

    let picker = h.service.get_picker_tree().await.unwrap();
    assert_eq!(names(&picker), ["Science"]);
    assert_eq!(names(&picker[0].children), ["Physics"]);
    // Two levels by default: Optics is below the cut.
    assert!(picker[0].children[0].children.is_empty());

    let active_roots = h.service.get_active_root_categories().await.unwrap();
    assert_eq!(active_roots.len(), 1);
}

#[tokio::test]
async fn test_cached_tree_reflects_mutations() {
    let h = Harness::new();
    scenario_abcd(&h).await;

    let first = h.service.get_picker_tree().await.unwrap();
    assert_eq!(names(&first), ["A", "D"]);

    h.service.rename_category(CategoryId(4), "Zeta").await.unwrap();
    let renamed = h.service.get_picker_tree().await.unwrap();
    assert_eq!(names(&renamed), ["A", "Zeta"]);

    let before = h
        .service
        .get_subcategories_tree(CategoryId(1), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.len(), 3);
    h.service
        .move_category(CategoryId(2), Some(CategoryId(4)))
        .await
        .unwrap();
    let after = h
        .service
        .get_subcategories_tree(CategoryId(1), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.len(), 1);
}

#[tokio::test]
async fn test_rename_keeps_slug() {
    let h = Harness::new();
    let id = h.create("Algebra", None).await;

    let renamed = h.service.rename_category(id, "Linear Algebra").await.unwrap();
    assert_eq!(renamed.name, "Linear Algebra");
    assert_eq!(renamed.slug, "algebra");

    // The old slug is still the category's, so it cannot be taken.
    let err = h
        .service
        .create_category(CreateCategoryRequest {
            slug: Some("algebra".to_string()),
            ..CreateCategoryRequest::named("Algebra II", None)
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
