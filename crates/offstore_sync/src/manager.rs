//! Cache manager: collection-scoped sync state.

use crate::query_cache::QueryCacheTracker;
use crate::sync_queue::SyncQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Keeper of per-collection sync state.
///
/// Owns one pending-write queue per collection plus the query-cache
/// tracker, with lifecycle tied to the store instance. State handles are
/// explicitly passed into the coordinator and façade at construction;
/// two managers never share mutable state.
#[derive(Debug, Default)]
pub struct CacheManager {
    queues: RwLock<HashMap<String, Arc<SyncQueue>>>,
    tracker: Arc<QueryCacheTracker>,
}

impl CacheManager {
    /// Creates a manager with no tracked collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending-write queue for a collection, creating it on
    /// first use.
    pub fn queue(&self, collection: &str) -> Arc<SyncQueue> {
        if let Some(queue) = self.queues.read().get(collection) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write();
        Arc::clone(
            queues
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(SyncQueue::new(collection))),
        )
    }

    /// Returns the shared query-cache tracker.
    pub fn tracker(&self) -> Arc<QueryCacheTracker> {
        Arc::clone(&self.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_queue::WriteAction;

    #[test]
    fn queue_is_shared_per_collection() {
        let manager = CacheManager::new();

        let a = manager.queue("todos");
        a.enqueue("x", WriteAction::Create);

        let b = manager.queue("todos");
        assert_eq!(b.count(), 1);

        let other = manager.queue("notes");
        assert_eq!(other.count(), 0);
    }

    #[test]
    fn managers_do_not_share_state() {
        let m1 = CacheManager::new();
        let m2 = CacheManager::new();

        m1.queue("todos").enqueue("x", WriteAction::Create);
        assert_eq!(m2.queue("todos").count(), 0);
    }
}
