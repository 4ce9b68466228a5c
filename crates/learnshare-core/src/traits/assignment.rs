//! Document-to-category assignment collaborator.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::CategoryId;

/// The document-assignment store the category hierarchy reads from.
///
/// The hierarchy never owns assignments: it only counts them when
/// computing displayed document counts. Attach and detach requests, and
/// the delete-policy check, go through the hierarchy backend so they are
/// serialized with topology changes.
#[async_trait]
pub trait AssignmentSource: Send + Sync + std::fmt::Debug + 'static {
    /// Number of documents attached directly to `category`.
    async fn count_direct_assignments(&self, category: CategoryId) -> AppResult<u64>;

    /// Number of distinct documents attached to any category in `subtree`.
    ///
    /// `subtree` is the category together with its descendant set, as
    /// resolved by the closure index. A document attached at two levels of
    /// the same subtree is counted once.
    async fn count_subtree_assignments(&self, subtree: &[CategoryId]) -> AppResult<u64>;
}
