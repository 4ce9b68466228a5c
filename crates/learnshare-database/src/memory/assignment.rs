//! In-memory document assignments.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;

use learnshare_core::result::AppResult;
use learnshare_core::traits::AssignmentSource;
use learnshare_core::types::{CategoryId, DocumentId};

/// Document assignments held in a concurrent map keyed by category.
///
/// Writers are expected to hold the hierarchy writer lock so that an
/// assignment never lands on a category that is being deleted.
#[derive(Debug, Default)]
pub struct MemoryAssignments {
    by_category: DashMap<CategoryId, BTreeSet<DocumentId>>,
}

impl MemoryAssignments {
    /// Create an empty assignment table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents attached directly to `category`.
    pub fn direct_count(&self, category: CategoryId) -> u64 {
        self.by_category
            .get(&category)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0)
    }

    /// Attach `document`. Returns `false` if already attached.
    pub fn insert(&self, document: DocumentId, category: CategoryId) -> bool {
        self.by_category.entry(category).or_default().insert(document)
    }

    /// Detach `document`. Returns `false` if not attached.
    pub fn remove(&self, document: DocumentId, category: CategoryId) -> bool {
        let removed = self
            .by_category
            .get_mut(&category)
            .map(|mut docs| docs.remove(&document))
            .unwrap_or(false);
        self.by_category.remove_if(&category, |_, docs| docs.is_empty());
        removed
    }

    /// Drop every assignment of `category`, returning how many there were.
    pub fn remove_category(&self, category: CategoryId) -> u64 {
        self.by_category
            .remove(&category)
            .map(|(_, docs)| docs.len() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl AssignmentSource for MemoryAssignments {
    async fn count_direct_assignments(&self, category: CategoryId) -> AppResult<u64> {
        Ok(self.direct_count(category))
    }

    async fn count_subtree_assignments(&self, subtree: &[CategoryId]) -> AppResult<u64> {
        let mut documents = BTreeSet::new();
        for category in subtree {
            if let Some(docs) = self.by_category.get(category) {
                documents.extend(docs.iter().copied());
            }
        }
        Ok(documents.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subtree_count_is_distinct() {
        let source = MemoryAssignments::new();
        let doc = DocumentId(7);
        assert!(source.insert(doc, CategoryId(1)));
        assert!(!source.insert(doc, CategoryId(1)));
        source.insert(doc, CategoryId(2));
        source.insert(DocumentId(8), CategoryId(2));

        let count = source
            .count_subtree_assignments(&[CategoryId(1), CategoryId(2)])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(source.count_direct_assignments(CategoryId(2)).await.unwrap(), 2);
    }

    #[test]
    fn test_remove_and_remove_category() {
        let source = MemoryAssignments::new();
        source.insert(DocumentId(1), CategoryId(3));
        source.insert(DocumentId(2), CategoryId(3));

        assert!(source.remove(DocumentId(1), CategoryId(3)));
        assert!(!source.remove(DocumentId(1), CategoryId(3)));
        assert_eq!(source.remove_category(CategoryId(3)), 1);
        assert_eq!(source.direct_count(CategoryId(3)), 0);
    }
}
