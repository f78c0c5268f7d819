//! Sync coordinator: push, pull and bidirectional sync.
//!
//! Push drains the pending-write queue against the network, one entity
//! at a time in queue order. Pull fetches remote state for a query and
//! reconciles it into the cache, optionally as a delta since the last
//! tracked fetch. Sync composes both, push first, since pull requires a
//! clean queue.

use crate::query_cache::QueryCacheTracker;
use crate::sync_queue::{PendingWrite, SyncQueue, WriteAction};
use chrono::Utc;
use offstore_core::{CacheStore, Entity, NetworkDataSource, Query, StoreError, StoreResult};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of draining the pending-write queue.
#[derive(Debug)]
pub struct PushResult<T> {
    /// Number of queue entries successfully replayed.
    pub push_count: u64,
    /// One slot per push attempt, in queue order: the saved entity for
    /// creates/updates, `None` for deletes and for failed attempts.
    pub entities: Vec<Option<T>>,
    /// Captured per-item failures. The queue entry for each failed item
    /// remains queued.
    pub errors: Vec<StoreError>,
}

impl<T> PushResult<T> {
    fn empty() -> Self {
        Self {
            push_count: 0,
            entities: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Result of fetching and reconciling remote state into the cache.
#[derive(Debug)]
pub struct PullResult<T> {
    /// Number of created/changed entities applied. Deletions are applied
    /// but never counted.
    pub pull_count: u64,
    /// The fetched entities.
    pub entities: Vec<T>,
    /// Captured failures. Populated only when a composed sync captures
    /// the clean-queue precondition instead of raising it.
    pub errors: Vec<StoreError>,
}

/// Result of a full bidirectional sync.
#[derive(Debug)]
pub struct SyncOutcome<T> {
    /// The push phase result.
    pub push: PushResult<T>,
    /// The pull phase result.
    pub pull: PullResult<T>,
}

/// What happened to a single queue entry during push.
enum PushOutcome<T> {
    /// Replayed against the network; entry removed.
    Pushed(Option<T>),
    /// Entry dropped or left queued without a network attempt.
    Skipped,
}

/// Orchestrates push and pull for one collection.
///
/// Holds explicitly passed, collection-scoped state handles: the shared
/// pending-write queue and the query-cache tracker both come from the
/// cache manager that owns them.
pub struct SyncCoordinator<T, N, C>
where
    T: Entity,
    N: NetworkDataSource<T>,
    C: CacheStore<T>,
{
    collection: String,
    network: Arc<N>,
    cache: Arc<C>,
    queue: Arc<SyncQueue>,
    tracker: Arc<QueryCacheTracker>,
    delta_set: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, N, C> SyncCoordinator<T, N, C>
where
    T: Entity,
    N: NetworkDataSource<T>,
    C: CacheStore<T>,
{
    /// Creates a coordinator for one collection.
    pub fn new(
        collection: impl Into<String>,
        network: Arc<N>,
        cache: Arc<C>,
        queue: Arc<SyncQueue>,
        tracker: Arc<QueryCacheTracker>,
        delta_set: bool,
    ) -> Self {
        Self {
            collection: collection.into(),
            network,
            cache,
            queue,
            tracker,
            delta_set,
            _marker: PhantomData,
        }
    }

    /// Replays queued mutations against the network, in queue order.
    ///
    /// An optional query restricts the drain to entries whose cached
    /// entity matches; delete entries have no cached state and are
    /// always eligible. A failure on one item is captured in the result
    /// and never halts the drain; progress made before any failure is
    /// retained, so push can safely be re-invoked.
    pub async fn push(&self, query: Option<&Query>) -> StoreResult<PushResult<T>> {
        let entries = self.queue.get_all();
        debug!(
            collection = %self.collection,
            pending = entries.len(),
            "pushing pending writes"
        );

        let mut result = PushResult::empty();
        for entry in entries {
            match self.push_one(&entry, query).await {
                Ok(PushOutcome::Pushed(entity)) => {
                    result.push_count += 1;
                    result.entities.push(entity);
                }
                Ok(PushOutcome::Skipped) => {}
                Err(error) => {
                    warn!(
                        collection = %self.collection,
                        entity_id = %entry.entity_id,
                        %error,
                        "push item failed; entry stays queued"
                    );
                    result.entities.push(None);
                    result.errors.push(error);
                }
            }
        }
        Ok(result)
    }

    /// Replays a single queue entry.
    async fn push_one(
        &self,
        entry: &PendingWrite,
        query: Option<&Query>,
    ) -> StoreResult<PushOutcome<T>> {
        match entry.action {
            WriteAction::Create | WriteAction::Update => {
                let Some(cached) = self.cache.get(&self.collection, &entry.entity_id)? else {
                    // Entity was removed locally (or the cache cleared);
                    // nothing to replay. Orphaned entries are dropped.
                    self.queue.remove(&entry.entity_id);
                    return Ok(PushOutcome::Skipped);
                };

                if let Some(q) = query {
                    if !q.matches_entity(&cached)? {
                        return Ok(PushOutcome::Skipped);
                    }
                }

                let saved = match entry.action {
                    WriteAction::Create => self.network.create(&self.collection, &cached).await?,
                    _ => {
                        self.network
                            .update(&self.collection, &entry.entity_id, &cached)
                            .await?
                    }
                };

                if saved.id() != entry.entity_id {
                    // Temporary ID reconciled with the server-issued one:
                    // rewrite the cache record and queue bookkeeping as
                    // one step each, cache first.
                    self.cache.rename(&self.collection, &entry.entity_id, &saved)?;
                    self.queue.rename(&entry.entity_id, saved.id());
                    self.queue.remove(saved.id());
                } else {
                    self.cache.put(&self.collection, &saved)?;
                    self.queue.remove(&entry.entity_id);
                }
                Ok(PushOutcome::Pushed(Some(saved)))
            }
            WriteAction::Delete => {
                // Idempotent: a zero count (already gone remotely) still
                // completes the entry.
                self.network.delete(&self.collection, &entry.entity_id).await?;
                self.queue.remove(&entry.entity_id);
                Ok(PushOutcome::Pushed(None))
            }
        }
    }

    /// Fetches remote entities for the query and reconciles them into
    /// the cache, pruning entities deleted server-side.
    ///
    /// Refuses to run while the pending-write queue is non-empty:
    /// pulling over unpushed local mutations would silently lose them.
    /// The check happens before any network I/O.
    pub async fn pull(&self, query: Option<&Query>) -> StoreResult<PullResult<T>> {
        let pending = self.queue.count();
        if pending > 0 {
            return Err(StoreError::PendingWrites { count: pending });
        }

        if self.delta_set {
            self.pull_delta(query).await
        } else {
            self.pull_full(query).await
        }
    }

    /// Full fetch: mirror the result set, delete cached entities that
    /// match the query but are gone remotely.
    async fn pull_full(&self, query: Option<&Query>) -> StoreResult<PullResult<T>> {
        let fetched = self.network.query(&self.collection, query).await?;

        let fetched_ids: HashSet<&str> = fetched.iter().map(Entity::id).collect();
        for stale in self.cache.query(&self.collection, query)? {
            if !fetched_ids.contains(stale.id()) {
                self.cache.delete(&self.collection, stale.id())?;
            }
        }

        for entity in &fetched {
            self.cache.put(&self.collection, entity)?;
        }

        debug!(
            collection = %self.collection,
            count = fetched.len(),
            "pull applied full fetch"
        );
        Ok(PullResult {
            pull_count: fetched.len() as u64,
            entities: fetched,
            errors: Vec::new(),
        })
    }

    /// Delta fetch: request only entities changed since the tracked
    /// baseline, plus IDs deleted since then.
    async fn pull_delta(&self, query: Option<&Query>) -> StoreResult<PullResult<T>> {
        let Some(since) = self.tracker.last_request(&self.collection, query) else {
            // First fetch for this query signature: full fetch and
            // baseline it.
            let at = Utc::now();
            let result = self.pull_full(query).await?;
            self.tracker.record(&self.collection, query, at);
            return Ok(result);
        };

        // Taken before the request so a concurrent remote write cannot
        // fall between the fetch and the new baseline.
        let at = Utc::now();
        let delta = match self.network.delta_query(&self.collection, query, since).await {
            Ok(delta) => delta,
            Err(error @ StoreError::Backend { .. }) => {
                warn!(
                    collection = %self.collection,
                    %error,
                    "delta fetch rejected; falling back to full fetch"
                );
                let result = self.pull_full(query).await?;
                self.tracker.record(&self.collection, query, at);
                return Ok(result);
            }
            Err(error) => return Err(error),
        };

        for id in &delta.deleted_ids {
            self.cache.delete(&self.collection, id)?;
        }
        for entity in &delta.changed {
            self.cache.put(&self.collection, entity)?;
        }

        // The baseline advances only when the fetch observed changes;
        // a no-change fetch leaves it untouched.
        if !delta.changed.is_empty() {
            self.tracker.record(&self.collection, query, at);
        }

        debug!(
            collection = %self.collection,
            changed = delta.changed.len(),
            deleted = delta.deleted_ids.len(),
            "pull applied delta fetch"
        );
        Ok(PullResult {
            pull_count: delta.changed.len() as u64,
            entities: delta.changed,
            errors: Vec::new(),
        })
    }

    /// Push, then pull, sequentially.
    ///
    /// If push left entries behind (per-item failures) the pull refuses
    /// its clean-queue precondition; sync captures that error inside the
    /// pull result instead of raising it, so callers always get the push
    /// outcome. Any other pull failure propagates.
    pub async fn sync(&self, query: Option<&Query>) -> StoreResult<SyncOutcome<T>> {
        let push = self.push(None).await?;

        let pull = match self.pull(query).await {
            Ok(pull) => pull,
            Err(error @ StoreError::PendingWrites { .. }) => PullResult {
                pull_count: 0,
                entities: Vec::new(),
                errors: vec![error],
            },
            Err(error) => return Err(error),
        };

        Ok(SyncOutcome { push, pull })
    }

    /// Counts pending writes, optionally restricted to entries whose
    /// cached entity matches the query (deletes are always counted, as
    /// in [`push`](Self::push)).
    pub fn pending_count(&self, query: Option<&Query>) -> StoreResult<u64> {
        let Some(q) = query else {
            return Ok(self.queue.count());
        };

        let mut count = 0;
        for entry in self.queue.get_all() {
            let eligible = match entry.action {
                WriteAction::Delete => true,
                _ => match self.cache.get(&self.collection, &entry.entity_id)? {
                    Some(cached) => q.matches_entity(&cached)?,
                    None => false,
                },
            };
            if eligible {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Discards pending writes without replaying them.
    ///
    /// With a query, only create/update entries whose cached entity
    /// matches are discarded; locally created entities lose their sync
    /// intent but stay in the cache as local-only records. Returns the
    /// number of queue entries removed.
    pub fn purge(&self, query: Option<&Query>) -> StoreResult<u64> {
        let Some(q) = query else {
            return Ok(self.queue.remove_all(None));
        };

        let mut ids = Vec::new();
        for entry in self.queue.get_all() {
            if entry.action == WriteAction::Delete {
                continue;
            }
            if let Some(cached) = self.cache.get(&self.collection, &entry.entity_id)? {
                if q.matches_entity(&cached)? {
                    ids.push(entry.entity_id);
                }
            }
        }
        Ok(self.queue.remove_all(Some(&ids)))
    }
}
