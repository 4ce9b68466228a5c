//! Tree, breadcrumb and child-list assembly from flat rows.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use learnshare_core::types::CategoryId;
use learnshare_entity::category::{Category, CategoryCrumb, CategoryTreeNode, ClosureEdge};

/// Assembles nested views from pre-fetched category rows and level-1
/// closure rows.
///
/// The builder only knows the categories it was given: a link whose parent
/// or child is missing is ignored, so passing only ACTIVE categories prunes
/// inactive branches and stale rows never surface a deleted category.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    nodes: HashMap<CategoryId, Category>,
    children: HashMap<CategoryId, Vec<CategoryId>>,
    parents: HashMap<CategoryId, CategoryId>,
    document_counts: HashMap<CategoryId, u64>,
}

impl TreeBuilder {
    /// Index `nodes` and the parent-child `links` between them.
    pub fn new(nodes: impl IntoIterator<Item = Category>, links: &[ClosureEdge]) -> Self {
        let nodes: HashMap<CategoryId, Category> = nodes
            .into_iter()
            .filter(Category::is_live)
            .map(|c| (c.id, c))
            .collect();

        let mut children: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
        let mut parents = HashMap::new();
        for link in links.iter().filter(|l| l.is_parent_link()) {
            if nodes.contains_key(&link.ancestor_id) && nodes.contains_key(&link.descendant_id) {
                children
                    .entry(link.ancestor_id)
                    .or_default()
                    .push(link.descendant_id);
                parents.insert(link.descendant_id, link.ancestor_id);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| nodes[a].display_cmp(&nodes[b]));
            siblings.dedup();
        }

        Self {
            nodes,
            children,
            parents,
            document_counts: HashMap::new(),
        }
    }

    /// Attach per-category document counts used by tree views.
    pub fn with_document_counts(mut self, counts: HashMap<CategoryId, u64>) -> Self {
        self.document_counts = counts;
        self
    }

    /// Category `id`, if it was given to the builder.
    pub fn node(&self, id: CategoryId) -> Option<&Category> {
        self.nodes.get(&id)
    }

    /// Number of categories known to the builder.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the builder knows no category.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of `id` among the known categories.
    pub fn parent_of(&self, id: CategoryId) -> Option<CategoryId> {
        self.parents.get(&id).copied()
    }

    /// Number of known ancestors above `id`.
    pub fn depth_of(&self, id: CategoryId) -> i32 {
        let mut depth = 0;
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Number of known direct children of `id`.
    pub fn child_count(&self, id: CategoryId) -> u64 {
        self.child_ids(id).len() as u64
    }

    /// Direct children of `parent`, in display order.
    pub fn build_children(&self, parent: CategoryId) -> Vec<&Category> {
        self.child_ids(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Known categories without a known parent, in display order.
    pub fn roots(&self) -> Vec<&Category> {
        let mut roots: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| !self.parents.contains_key(&c.id))
            .collect();
        roots.sort_by(|a, b| a.display_cmp(b));
        roots
    }

    /// `root` and everything below it, pre-order.
    pub fn subtree_ids(&self, root: CategoryId) -> Vec<CategoryId> {
        self.visible_ids(root, None)
    }

    /// Ids that [`build_subtree`](Self::build_subtree) would emit for
    /// `root` and `max_depth`, pre-order.
    pub fn visible_ids(&self, root: CategoryId, max_depth: Option<u32>) -> Vec<CategoryId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&root) {
            return out;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![(root, 0u32)];
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for child in self.child_ids(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    /// Nested view of `root`, expanding at most `max_depth` levels below it.
    ///
    /// Returns `None` when `root` is unknown, e.g. deleted since the rows
    /// were read.
    pub fn build_subtree(&self, root: CategoryId, max_depth: Option<u32>) -> Option<CategoryTreeNode> {
        let mut seen = HashSet::new();
        self.build_node(root, 0, max_depth, &mut seen)
    }

    /// Nested views of every known root.
    pub fn build_forest(&self, max_depth: Option<u32>) -> Vec<CategoryTreeNode> {
        self.roots()
            .into_iter()
            .filter_map(|root| self.build_subtree(root.id, max_depth))
            .collect()
    }

    /// Path from the root down to `node`, given `node`'s ancestor rows.
    ///
    /// Ancestors the builder does not know are skipped and reported.
    pub fn build_breadcrumb(&self, node: CategoryId, ancestors: &[ClosureEdge]) -> Vec<CategoryCrumb> {
        let Some(target) = self.nodes.get(&node) else {
            return Vec::new();
        };
        let mut chain: Vec<&ClosureEdge> = ancestors
            .iter()
            .filter(|e| e.descendant_id == node && e.level >= 1)
            .collect();
        chain.sort_by(|a, b| b.level.cmp(&a.level));

        let mut crumbs: Vec<CategoryCrumb> = Vec::with_capacity(chain.len() + 1);
        for edge in chain {
            match self.nodes.get(&edge.ancestor_id) {
                Some(ancestor) => crumbs.push(CategoryCrumb::from(ancestor)),
                None => warn!(
                    category_id = %node,
                    ancestor_id = %edge.ancestor_id,
                    "Breadcrumb skips unknown ancestor"
                ),
            }
        }
        crumbs.push(CategoryCrumb::from(target));
        crumbs
    }

    fn child_ids(&self, parent: CategoryId) -> &[CategoryId] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    fn build_node(
        &self,
        id: CategoryId,
        depth: u32,
        max_depth: Option<u32>,
        seen: &mut HashSet<CategoryId>,
    ) -> Option<CategoryTreeNode> {
        let category = self.nodes.get(&id)?;
        if !seen.insert(id) {
            warn!(category_id = %id, "Parent links revisit a category; branch cut");
            return None;
        }
        let children = if max_depth.is_some_and(|max| depth >= max) {
            Vec::new()
        } else {
            self.child_ids(id)
                .iter()
                .filter_map(|child| self.build_node(*child, depth + 1, max_depth, seen))
                .collect()
        };
        Some(CategoryTreeNode {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
            status: category.status,
            document_count: self.document_counts.get(&id).copied().unwrap_or(0),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use learnshare_entity::category::CategoryStatus;

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

    fn link(parent: i64, child: i64) -> ClosureEdge {
        ClosureEdge::from((parent, child, 1))
    }

    /// Science(1) → [Physics(2) → Optics(4), Chemistry(3)], Arts(5)
    fn builder() -> TreeBuilder {
        TreeBuilder::new(
            vec![
                category(1, "Science", 0),
                category(2, "Physics", 1),
                category(3, "Chemistry", 1),
                category(4, "Optics", 0),
                category(5, "Arts", 0),
            ],
            &[link(1, 2), link(1, 3), link(2, 4)],
        )
    }

    fn names(nodes: &[CategoryTreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_children_ordered_by_sort_order_then_name() {
        let builder = builder();
        let children: Vec<&str> = builder
            .build_children(CategoryId(1))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(children, ["Chemistry", "Physics"]);
    }

    #[test]
    fn test_subtree_and_depth_limit() {
        let builder = builder();
        let full = builder.build_subtree(CategoryId(1), None).unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(names(&full.children), ["Chemistry", "Physics"]);
        assert_eq!(names(&full.children[1].children), ["Optics"]);
        assert_eq!(builder.depth_of(CategoryId(4)), 2);
        assert_eq!(builder.child_count(CategoryId(1)), 2);

        let shallow = builder.build_subtree(CategoryId(1), Some(1)).unwrap();
        assert_eq!(shallow.len(), 3);
        assert!(shallow.children.iter().all(|c| c.children.is_empty()));

        let root_only = builder.build_subtree(CategoryId(1), Some(0)).unwrap();
        assert_eq!(root_only.len(), 1);
        assert_eq!(
            builder.visible_ids(CategoryId(1), Some(1)),
            vec![CategoryId(1), CategoryId(3), CategoryId(2)]
        );
    }

    #[test]
    fn test_unknown_root_is_empty_not_error() {
        assert!(builder().build_subtree(CategoryId(99), None).is_none());
        assert!(builder().subtree_ids(CategoryId(99)).is_empty());
    }

    #[test]
    fn test_deleted_rows_never_appear() {
        let mut deleted = category(2, "Physics", 1);
        deleted.deleted_at = Some(Utc::now());
        let builder = TreeBuilder::new(
            vec![category(1, "Science", 0), deleted, category(4, "Optics", 0)],
            &[link(1, 2), link(2, 4)],
        );
        let tree = builder.build_subtree(CategoryId(1), None).unwrap();
        assert!(tree.children.is_empty());
        // Optics lost its parent and surfaces as a root of its own.
        assert_eq!(names(&builder.build_forest(None)), ["Optics", "Science"]);
    }

    #[test]
    fn test_forest_orders_roots() {
        let forest = builder().build_forest(Some(0));
        assert_eq!(names(&forest), ["Arts", "Science"]);
    }

    #[test]
    fn test_breadcrumb_runs_root_to_node() {
        let builder = builder();
        let ancestors = vec![
            ClosureEdge::from((2, 4, 1)),
            ClosureEdge::from((1, 4, 2)),
        ];
        let crumbs: Vec<String> = builder
            .build_breadcrumb(CategoryId(4), &ancestors)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(crumbs, ["Science", "Physics", "Optics"]);
        assert!(builder.build_breadcrumb(CategoryId(42), &ancestors).is_empty());
    }

    #[test]
    fn test_document_counts_are_attached() {
        let builder = builder().with_document_counts(HashMap::from([(CategoryId(2), 3)]));
        let tree = builder.build_subtree(CategoryId(2), None).unwrap();
        assert_eq!(tree.document_count, 3);
        assert_eq!(tree.children[0].document_count, 0);
    }
}
