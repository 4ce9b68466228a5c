//! In-memory closure index.
//!
//! Edges are kept in two id-indexed maps (ancestor → descendants and
//! descendant → ancestors) so that both directions are a single lookup.
//! This is the reference implementation of the closure-table maintenance
//! rules; the Postgres repository runs the same rules as set-based SQL.

use std::collections::{BTreeMap, BTreeSet};

use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::types::{CategoryId, DeletePolicy};
use learnshare_entity::category::ClosureEdge;

/// Rows touched by a topology change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeDelta {
    /// Rows deleted.
    pub removed: u64,
    /// Rows inserted.
    pub inserted: u64,
}

/// Nodes taken out of the index by [`ClosureIndex::delete_node`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Nodes no longer indexed; the caller soft-deletes these.
    pub removed: Vec<CategoryId>,
    /// Direct children re-attached to the grandparent.
    pub promoted: Vec<CategoryId>,
    /// Total rows deleted, including rows rewritten by promotion.
    pub edges_removed: u64,
}

/// Transitive closure of the category parent relation.
#[derive(Debug, Clone, Default)]
pub struct ClosureIndex {
    /// ancestor → (descendant → level)
    down: BTreeMap<CategoryId, BTreeMap<CategoryId, i32>>,
    /// descendant → (ancestor → level)
    up: BTreeMap<CategoryId, BTreeMap<CategoryId, i32>>,
}

impl ClosureIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from stored rows.
    pub fn from_edges(edges: impl IntoIterator<Item = ClosureEdge>) -> Self {
        let mut index = Self::new();
        for edge in edges {
            index.insert_edge(edge.ancestor_id, edge.descendant_id, edge.level);
        }
        index
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.down.values().map(BTreeMap::len).sum()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.down.is_empty()
    }

    /// Whether `id` has its self-edge.
    pub fn contains_node(&self, id: CategoryId) -> bool {
        self.level(id, id) == Some(0)
    }

    /// All rows ordered by `(ancestor, descendant)`.
    pub fn edges(&self) -> Vec<ClosureEdge> {
        self.down
            .iter()
            .flat_map(|(a, ds)| ds.iter().map(|(d, l)| ClosureEdge::new(*a, *d, *l)))
            .collect()
    }

    /// Level of the row `(ancestor, descendant)`, if present.
    pub fn level(&self, ancestor: CategoryId, descendant: CategoryId) -> Option<i32> {
        self.down.get(&ancestor).and_then(|ds| ds.get(&descendant)).copied()
    }

    /// Whether `(ancestor, descendant, level ≥ 0)` exists.
    pub fn exists_edge(&self, ancestor: CategoryId, descendant: CategoryId) -> bool {
        self.level(ancestor, descendant).is_some()
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors_of(&self, id: CategoryId) -> Vec<ClosureEdge> {
        let mut edges: Vec<ClosureEdge> = self
            .up
            .get(&id)
            .into_iter()
            .flat_map(|anc| anc.iter())
            .filter(|(_, level)| **level >= 1)
            .map(|(a, l)| ClosureEdge::new(*a, id, *l))
            .collect();
        edges.sort_by_key(|e| (e.level, e.ancestor_id));
        edges
    }

    /// `id` and all of its descendants, shallowest first.
    pub fn descendants_of(&self, id: CategoryId) -> Vec<ClosureEdge> {
        let mut edges: Vec<ClosureEdge> = self
            .down
            .get(&id)
            .into_iter()
            .flat_map(|ds| ds.iter())
            .map(|(d, l)| ClosureEdge::new(id, *d, *l))
            .collect();
        edges.sort_by_key(|e| (e.level, e.descendant_id));
        edges
    }

    /// The descendant set of `id`, including `id` when indexed.
    pub fn descendant_set(&self, id: CategoryId) -> BTreeSet<CategoryId> {
        self.down
            .get(&id)
            .map(|ds| ds.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Direct parent of `id`.
    pub fn parent_of(&self, id: CategoryId) -> Option<CategoryId> {
        self.up
            .get(&id)?
            .iter()
            .find(|(_, level)| **level == 1)
            .map(|(a, _)| *a)
    }

    /// Direct children of `id`, by id.
    pub fn children_of(&self, id: CategoryId) -> Vec<CategoryId> {
        self.down
            .get(&id)
            .into_iter()
            .flat_map(|ds| ds.iter())
            .filter(|(_, level)| **level == 1)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Indexed nodes without a parent.
    pub fn roots(&self) -> Vec<CategoryId> {
        self.down
            .keys()
            .copied()
            .filter(|id| self.contains_node(*id) && self.parent_of(*id).is_none())
            .collect()
    }

    /// Depth of `id` below its root.
    pub fn depth_of(&self, id: CategoryId) -> Option<i32> {
        if !self.contains_node(id) {
            return None;
        }
        Some(
            self.up
                .get(&id)
                .and_then(|anc| anc.values().copied().max())
                .unwrap_or(0),
        )
    }

    /// Every level-1 row whose descendant lies strictly inside `id`'s subtree.
    pub fn subtree_links(&self, id: CategoryId) -> Vec<ClosureEdge> {
        self.descendant_set(id)
            .into_iter()
            .filter(|d| *d != id)
            .filter_map(|d| self.parent_of(d).map(|p| ClosureEdge::new(p, d, 1)))
            .collect()
    }

    /// Add `new_id` as a root, or as a child of `parent_id`.
    ///
    /// The new node inherits every ancestor row of its parent one level
    /// further away, plus a row to the parent itself via the parent's
    /// self-edge. Returns the number of rows inserted.
    pub fn insert_under_parent(
        &mut self,
        new_id: CategoryId,
        parent_id: Option<CategoryId>,
    ) -> AppResult<u64> {
        if self.contains_node(new_id) {
            return Err(AppError::conflict(format!(
                "Category {new_id} is already in the closure index"
            )));
        }
        let inherited: Vec<(CategoryId, i32)> = match parent_id {
            None => Vec::new(),
            Some(parent) => {
                if !self.contains_node(parent) {
                    return Err(AppError::not_found(format!(
                        "Parent category {parent} not found"
                    )));
                }
                self.up
                    .get(&parent)
                    .into_iter()
                    .flat_map(|anc| anc.iter())
                    .map(|(a, l)| (*a, *l))
                    .collect()
            }
        };

        self.insert_edge(new_id, new_id, 0);
        for (ancestor, level) in &inherited {
            self.insert_edge(*ancestor, new_id, level + 1);
        }
        Ok(1 + inherited.len() as u64)
    }

    /// Reattach the subtree rooted at `node_id` under `new_parent_id`
    /// (or make it a root).
    ///
    /// Rows linking the subtree to ancestors outside it are dropped; rows
    /// inside the subtree are kept as they are. Every member is then linked
    /// to every ancestor of the new parent at the combined distance.
    /// Fails with a cycle error, touching nothing, when the new parent is
    /// the node itself or one of its descendants.
    pub fn move_subtree(
        &mut self,
        node_id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> AppResult<EdgeDelta> {
        if !self.contains_node(node_id) {
            return Err(AppError::not_found(format!("Category {node_id} not found")));
        }
        if let Some(parent) = new_parent_id {
            if !self.contains_node(parent) {
                return Err(AppError::not_found(format!(
                    "Target parent category {parent} not found"
                )));
            }
            if self.exists_edge(node_id, parent) {
                return Err(AppError::cycle(format!(
                    "Category {node_id} cannot be moved under itself or its descendant {parent}"
                )));
            }
        }

        let subtree: BTreeMap<CategoryId, i32> =
            self.down.get(&node_id).cloned().unwrap_or_default();

        let mut delta = EdgeDelta::default();
        for member in subtree.keys() {
            let outside: Vec<CategoryId> = self
                .up
                .get(member)
                .into_iter()
                .flat_map(|anc| anc.keys())
                .filter(|a| !subtree.contains_key(a))
                .copied()
                .collect();
            for ancestor in outside {
                if self.remove_edge(ancestor, *member) {
                    delta.removed += 1;
                }
            }
        }

        if let Some(parent) = new_parent_id {
            let anchors: Vec<(CategoryId, i32)> = self
                .up
                .get(&parent)
                .into_iter()
                .flat_map(|anc| anc.iter())
                .map(|(a, l)| (*a, *l))
                .collect();
            for (ancestor, level) in &anchors {
                for (member, rel_level) in &subtree {
                    self.insert_edge(*ancestor, *member, level + 1 + rel_level);
                    delta.inserted += 1;
                }
            }
        }

        Ok(delta)
    }

    /// Take `node_id` out of the index under `policy`.
    ///
    /// The caller soft-deletes [`Removal::removed`] in the same unit of work.
    pub fn delete_node(&mut self, node_id: CategoryId, policy: DeletePolicy) -> AppResult<Removal> {
        if !self.contains_node(node_id) {
            return Err(AppError::not_found(format!("Category {node_id} not found")));
        }
        match policy {
            DeletePolicy::BlockIfNonempty => {
                let edges_removed = self.detach_leaf(node_id)?;
                Ok(Removal {
                    removed: vec![node_id],
                    promoted: Vec::new(),
                    edges_removed,
                })
            }
            DeletePolicy::Cascade => {
                let members = self.descendants_of(node_id);
                let removed: Vec<CategoryId> = members.iter().map(|e| e.descendant_id).collect();
                let mut edges_removed = 0;
                for member in &removed {
                    edges_removed += self.drop_node_rows(*member);
                }
                Ok(Removal {
                    removed,
                    promoted: Vec::new(),
                    edges_removed,
                })
            }
            DeletePolicy::PromoteChildren => {
                let grandparent = self.parent_of(node_id);
                let children = self.children_of(node_id);
                let mut edges_removed = 0;
                for child in &children {
                    edges_removed += self.move_subtree(*child, grandparent)?.removed;
                }
                edges_removed += self.detach_leaf(node_id)?;
                Ok(Removal {
                    removed: vec![node_id],
                    promoted: children,
                    edges_removed,
                })
            }
        }
    }

    /// Remove the self-edge and ancestor rows of a childless node.
    fn detach_leaf(&mut self, node_id: CategoryId) -> AppResult<u64> {
        let children = self.children_of(node_id);
        if !children.is_empty() {
            return Err(AppError::conflict(format!(
                "Category {node_id} still has {} subcategories",
                children.len()
            )));
        }
        Ok(self.drop_node_rows(node_id))
    }

    /// Remove every row that has `id` at either end.
    fn drop_node_rows(&mut self, id: CategoryId) -> u64 {
        let mut pairs: Vec<(CategoryId, CategoryId)> = Vec::new();
        if let Some(anc) = self.up.get(&id) {
            pairs.extend(anc.keys().map(|a| (*a, id)));
        }
        if let Some(ds) = self.down.get(&id) {
            pairs.extend(ds.keys().filter(|d| **d != id).map(|d| (id, *d)));
        }
        pairs
            .into_iter()
            .filter(|(a, d)| self.remove_edge(*a, *d))
            .count() as u64
    }

    fn insert_edge(&mut self, ancestor: CategoryId, descendant: CategoryId, level: i32) {
        self.down
            .entry(ancestor)
            .or_default()
            .insert(descendant, level);
        self.up.entry(descendant).or_default().insert(ancestor, level);
    }

    fn remove_edge(&mut self, ancestor: CategoryId, descendant: CategoryId) -> bool {
        let removed = self
            .down
            .get_mut(&ancestor)
            .and_then(|ds| ds.remove(&descendant))
            .is_some();
        if self.down.get(&ancestor).is_some_and(BTreeMap::is_empty) {
            self.down.remove(&ancestor);
        }
        if let Some(anc) = self.up.get_mut(&descendant) {
            anc.remove(&ancestor);
            if anc.is_empty() {
                self.up.remove(&descendant);
            }
        }
        removed
    }
}
