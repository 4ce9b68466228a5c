//! Read cache for assembled category trees.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use learnshare_core::config::TreeCacheConfig;
use learnshare_core::types::CategoryId;
use learnshare_entity::category::CategoryTreeNode;

/// What a cached forest was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKey {
    /// `getSubcategoriesTree(root, max_depth)`.
    Subtree {
        root: CategoryId,
        max_depth: Option<u32>,
    },
    /// The upload-wizard picker forest.
    Picker,
}

/// Cache of assembled trees, emptied by every committed mutation.
///
/// Entries are stamped with the mutation generation current when the read
/// started. A mutation bumps the generation, so a tree assembled from
/// pre-mutation rows can never be served after the mutation returns, even
/// if it is inserted late.
#[derive(Debug)]
pub struct TreeCache {
    cache: Option<Cache<(u64, TreeKey), Arc<Vec<CategoryTreeNode>>>>,
    generation: AtomicU64,
}

impl TreeCache {
    /// Create a cache from configuration.
    pub fn new(config: &TreeCacheConfig) -> Self {
        let cache = config.enabled.then(|| {
            Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(Duration::from_secs(config.time_to_live_seconds))
                .build()
        });
        Self {
            cache,
            generation: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            cache: None,
            generation: AtomicU64::new(0),
        }
    }

    /// Current mutation generation; take it before reading rows.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached forest for `key` at the current generation.
    pub async fn get(&self, key: TreeKey) -> Option<Arc<Vec<CategoryTreeNode>>> {
        let cache = self.cache.as_ref()?;
        let hit = cache.get(&(self.generation(), key)).await;
        if hit.is_some() {
            debug!(?key, "Tree cache hit");
        }
        hit
    }

    /// Store a forest assembled from rows read at `generation`.
    pub async fn insert(&self, generation: u64, key: TreeKey, forest: Arc<Vec<CategoryTreeNode>>) {
        if let Some(cache) = &self.cache {
            cache.insert((generation, key), forest).await;
        }
    }

    /// Drop every cached tree.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnshare_entity::category::CategoryStatus;

    fn forest() -> Arc<Vec<CategoryTreeNode>> {
        Arc::new(vec![CategoryTreeNode {
            id: CategoryId(1),
            name: "Science".to_string(),
            slug: "science".to_string(),
            description: None,
            status: CategoryStatus::Active,
            document_count: 0,
            children: Vec::new(),
        }])
    }

    #[tokio::test]
    async fn test_invalidate_hides_entries() {
        let cache = TreeCache::new(&TreeCacheConfig::default());
        let generation = cache.generation();
        cache.insert(generation, TreeKey::Picker, forest()).await;
        assert!(cache.get(TreeKey::Picker).await.is_some());

        cache.invalidate();
        assert!(cache.get(TreeKey::Picker).await.is_none());
    }

    #[tokio::test]
    async fn test_late_insert_from_old_generation_is_never_served() {
        let cache = TreeCache::new(&TreeCacheConfig::default());
        let generation = cache.generation();
        cache.invalidate();
        cache.insert(generation, TreeKey::Picker, forest()).await;
        assert!(cache.get(TreeKey::Picker).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = TreeCache::disabled();
        cache.insert(0, TreeKey::Picker, forest()).await;
        assert!(cache.get(TreeKey::Picker).await.is_none());
    }
}
