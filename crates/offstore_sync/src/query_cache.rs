//! Query-cache (delta-set) tracker.
//!
//! Persists, per collection and query signature, the timestamp of the
//! last fetch that successfully reached the network. Pull consults it to
//! compute the `since` parameter for delta requests.

use chrono::{DateTime, Utc};
use offstore_core::Query;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tracks delta-set baselines for all collections of one store instance.
///
/// `last_request` is monotonically non-decreasing per key and only
/// advances via [`record`](QueryCacheTracker::record), which callers
/// invoke after a fetch that actually reached the network.
#[derive(Debug, Default)]
pub struct QueryCacheTracker {
    items: RwLock<HashMap<String, DateTime<Utc>>>,
}

fn cache_key(collection: &str, query: Option<&Query>) -> String {
    match query {
        Some(q) => format!("{collection}:{}", q.signature()),
        None => format!("{collection}:"),
    }
}

impl QueryCacheTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the baseline for a collection/query pair, if one exists.
    pub fn last_request(&self, collection: &str, query: Option<&Query>) -> Option<DateTime<Utc>> {
        self.items.read().get(&cache_key(collection, query)).copied()
    }

    /// Records a new baseline. Never moves the timestamp backwards.
    pub fn record(&self, collection: &str, query: Option<&Query>, at: DateTime<Utc>) {
        let mut items = self.items.write();
        let entry = items.entry(cache_key(collection, query)).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// Drops all baselines for a collection, forcing the next pull to be
    /// a full fetch.
    pub fn invalidate(&self, collection: &str) {
        let prefix = format!("{collection}:");
        self.items.write().retain(|key, _| !key.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_baselines_per_query_signature() {
        let tracker = QueryCacheTracker::new();
        let now = Utc::now();
        let query = Query::new().eq("done", false);

        tracker.record("todos", None, now);
        assert!(tracker.last_request("todos", None).is_some());
        assert!(tracker.last_request("todos", Some(&query)).is_none());
        assert!(tracker.last_request("notes", None).is_none());
    }

    #[test]
    fn record_is_monotonic() {
        let tracker = QueryCacheTracker::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);

        tracker.record("todos", None, t1);
        tracker.record("todos", None, t0);
        assert_eq!(tracker.last_request("todos", None), Some(t1));

        let t2 = t1 + chrono::Duration::seconds(10);
        tracker.record("todos", None, t2);
        assert_eq!(tracker.last_request("todos", None), Some(t2));
    }

    #[test]
    fn invalidate_scopes_to_collection() {
        let tracker = QueryCacheTracker::new();
        let now = Utc::now();
        tracker.record("todos", None, now);
        tracker.record("notes", None, now);

        tracker.invalidate("todos");
        assert!(tracker.last_request("todos", None).is_none());
        assert!(tracker.last_request("notes", None).is_some());
    }
}
