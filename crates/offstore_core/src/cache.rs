//! Local cache store contract and in-memory implementation.

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::query::Query;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The local, on-device persisted copy of entities, keyed by collection
/// name and entity ID.
///
/// The cache is an embedded document store; its calls are synchronous.
/// It owns persisted entity state only — sync bookkeeping (the pending
/// write queue, query-cache items) lives with the cache manager, not
/// here.
pub trait CacheStore<T: Entity>: Send + Sync {
    /// Fetches an entity by ID, or `None` if not cached.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<T>>;

    /// Inserts or replaces an entity under its own ID.
    fn put(&self, collection: &str, entity: &T) -> StoreResult<()>;

    /// Deletes an entity by ID. Returns true if it was present.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Deletes all entities matching the query, returning the count.
    fn delete_by_query(&self, collection: &str, query: &Query) -> StoreResult<u64>;

    /// Runs a query against the cached entities.
    fn query(&self, collection: &str, query: Option<&Query>) -> StoreResult<Vec<T>>;

    /// Counts cached entities matching the query.
    fn count(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64>;

    /// Replaces the record stored under `old_id` with `entity` under its
    /// new ID, as one logical step.
    ///
    /// This is the cache half of the temporary-ID-to-server-ID rewrite;
    /// observers never see both records or neither.
    fn rename(&self, collection: &str, old_id: &str, entity: &T) -> StoreResult<()>;

    /// Removes matching entities outright, returning the count. `None`
    /// clears the whole collection.
    fn clear(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64>;
}

/// An in-memory cache store.
///
/// Backs tests and short-lived stores; a persistent deployment swaps in
/// a disk-backed implementation of [`CacheStore`] without touching the
/// sync layer.
#[derive(Debug, Default)]
pub struct MemoryCache<T> {
    collections: RwLock<HashMap<String, HashMap<String, T>>>,
}

impl<T: Entity> MemoryCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn all(&self, collection: &str) -> Vec<T> {
        self.collections
            .read()
            .get(collection)
            .map(|entities| entities.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T: Entity> CacheStore<T> for MemoryCache<T> {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|entities| entities.get(id))
            .cloned())
    }

    fn put(&self, collection: &str, entity: &T) -> StoreResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|entities| entities.remove(id))
            .is_some())
    }

    fn delete_by_query(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        let matched = query.apply(self.all(collection))?;
        let mut collections = self.collections.write();
        let Some(entities) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut removed = 0;
        for entity in &matched {
            if entities.remove(entity.id()).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn query(&self, collection: &str, query: Option<&Query>) -> StoreResult<Vec<T>> {
        let all = self.all(collection);
        match query {
            Some(q) => q.apply(all),
            None => Ok(all),
        }
    }

    fn count(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64> {
        Ok(self.query(collection, query)?.len() as u64)
    }

    fn rename(&self, collection: &str, old_id: &str, entity: &T) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let entities = collections.entry(collection.to_string()).or_default();
        entities.remove(old_id);
        entities.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    fn clear(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64> {
        match query {
            Some(q) => self.delete_by_query(collection, q),
            None => {
                let mut collections = self.collections.write();
                Ok(collections
                    .remove(collection)
                    .map(|entities| entities.len() as u64)
                    .unwrap_or(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Acl, Kmd};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
        pinned: bool,
        acl: Option<Acl>,
        kmd: Option<Kmd>,
    }

    impl Entity for Note {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn acl(&self) -> Option<&Acl> {
            self.acl.as_ref()
        }
        fn set_acl(&mut self, acl: Option<Acl>) {
            self.acl = acl;
        }
        fn kmd(&self) -> Option<&Kmd> {
            self.kmd.as_ref()
        }
        fn set_kmd(&mut self, kmd: Option<Kmd>) {
            self.kmd = kmd;
        }
    }

    fn note(id: &str, text: &str, pinned: bool) -> Note {
        Note {
            id: id.into(),
            text: text.into(),
            pinned,
            acl: None,
            kmd: None,
        }
    }

    #[test]
    fn put_get_delete() {
        let cache = MemoryCache::new();
        let n = note("n1", "hello", false);

        cache.put("notes", &n).unwrap();
        assert_eq!(cache.get("notes", "n1").unwrap(), Some(n));
        assert_eq!(cache.get("notes", "missing").unwrap(), None);
        assert_eq!(cache.get("other", "n1").unwrap(), None);

        assert!(cache.delete("notes", "n1").unwrap());
        assert!(!cache.delete("notes", "n1").unwrap());
    }

    #[test]
    fn query_and_count() {
        let cache = MemoryCache::new();
        cache.put("notes", &note("n1", "a", true)).unwrap();
        cache.put("notes", &note("n2", "b", false)).unwrap();
        cache.put("notes", &note("n3", "c", true)).unwrap();

        let pinned = Query::new().eq("pinned", true);
        assert_eq!(cache.count("notes", Some(&pinned)).unwrap(), 2);
        assert_eq!(cache.count("notes", None).unwrap(), 3);

        let found = cache.query("notes", Some(&pinned)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn delete_by_query_counts_removals() {
        let cache = MemoryCache::new();
        cache.put("notes", &note("n1", "a", true)).unwrap();
        cache.put("notes", &note("n2", "b", false)).unwrap();

        let pinned = Query::new().eq("pinned", true);
        assert_eq!(cache.delete_by_query("notes", &pinned).unwrap(), 1);
        assert_eq!(cache.count("notes", None).unwrap(), 1);
    }

    #[test]
    fn rename_swaps_ids_atomically() {
        let cache = MemoryCache::new();
        cache.put("notes", &note("temp-1", "draft", false)).unwrap();

        let promoted = note("server-1", "draft", false);
        cache.rename("notes", "temp-1", &promoted).unwrap();

        assert_eq!(cache.get("notes", "temp-1").unwrap(), None);
        assert_eq!(cache.get("notes", "server-1").unwrap(), Some(promoted));
        assert_eq!(cache.count("notes", None).unwrap(), 1);
    }

    #[test]
    fn clear_with_and_without_query() {
        let cache = MemoryCache::new();
        cache.put("notes", &note("n1", "a", true)).unwrap();
        cache.put("notes", &note("n2", "b", false)).unwrap();

        let pinned = Query::new().eq("pinned", true);
        assert_eq!(cache.clear("notes", Some(&pinned)).unwrap(), 1);
        assert_eq!(cache.clear("notes", None).unwrap(), 1);
        assert_eq!(cache.count("notes", None).unwrap(), 0);
    }
}
