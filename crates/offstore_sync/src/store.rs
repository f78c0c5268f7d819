//! Unified data store façade.
//!
//! One API whose execution transparently switches between
//! network-backed and cache-backed behavior. The store type is chosen
//! once at construction; every operation then branches on that tag, so
//! the network-then-cache fallback logic stays colocated and auditable
//! per operation rather than spread over subclasses.

use crate::config::StoreConfig;
use crate::coordinator::{PullResult, PushResult, SyncCoordinator, SyncOutcome};
use crate::manager::CacheManager;
use crate::sync_queue::{SyncQueue, WriteAction};
use offstore_core::{
    group_and_reduce, is_temp_id, temp_id, Aggregation, BatchIndexError, CacheStore, Entity,
    NetworkDataSource, Query, ReduceFn, StoreError, StoreResult,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Execution mode of a data store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// Straight through to the network; successful results are mirrored
    /// into the cache.
    Network,
    /// Cache only; mutations are queued for a later push.
    Sync,
    /// Network first, falling back to the `Sync` behavior on
    /// connectivity failures.
    Auto,
}

/// Result of a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResponse {
    /// Number of entities removed.
    pub count: u64,
}

/// Result of a batch save: one slot per input position, plus per-index
/// errors for the failed positions. Errors never abort sibling items.
#[derive(Debug)]
pub struct MultiSaveResult<T> {
    /// Saved entities, position aligned with the input; `None` where the
    /// item failed.
    pub entities: Vec<Option<T>>,
    /// Errors for the failed positions.
    pub errors: Vec<BatchIndexError>,
}

/// A collection-scoped store dispatching between network and cache.
///
/// Generic over the entity type and the two collaborator
/// implementations. Sync bookkeeping (pending-write queue, query-cache
/// items) comes from the [`CacheManager`] handle passed at construction.
pub struct DataStore<T, N, C>
where
    T: Entity,
    N: NetworkDataSource<T>,
    C: CacheStore<T>,
{
    collection: String,
    store_type: StoreType,
    network: Arc<N>,
    cache: Arc<C>,
    manager: Arc<CacheManager>,
    queue: Arc<SyncQueue>,
    config: StoreConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, N, C> DataStore<T, N, C>
where
    T: Entity,
    N: NetworkDataSource<T>,
    C: CacheStore<T>,
{
    /// Creates a store for one collection with the default configuration.
    pub fn new(
        collection: impl Into<String>,
        store_type: StoreType,
        network: Arc<N>,
        cache: Arc<C>,
        manager: Arc<CacheManager>,
    ) -> Self {
        let collection = collection.into();
        let queue = manager.queue(&collection);
        Self {
            collection,
            store_type,
            network,
            cache,
            manager,
            queue,
            config: StoreConfig::default(),
            _marker: PhantomData,
        }
    }

    /// Replaces the store configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the execution mode.
    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    fn coordinator(&self) -> SyncCoordinator<T, N, C> {
        SyncCoordinator::new(
            self.collection.clone(),
            Arc::clone(&self.network),
            Arc::clone(&self.cache),
            Arc::clone(&self.queue),
            self.manager.tracker(),
            self.config.delta_set,
        )
    }

    /// Rejects queries the backend query language cannot express, before
    /// any I/O happens.
    fn ensure_supported(&self, query: Option<&Query>) -> StoreResult<()> {
        if let Some(reason) = query.and_then(Query::unsupported_reason) {
            return Err(StoreError::unsupported_where(reason));
        }
        Ok(())
    }

    // ----- save -----

    /// Saves one entity.
    ///
    /// Assigns a client-side temporary ID when none is present. NETWORK
    /// creates or updates remotely (create vs update detected by the
    /// presence of a pre-existing non-temporary ID) and mirrors the
    /// result into the cache. SYNC writes to the cache and queues a
    /// pending write. AUTO tries the network path and falls back to the
    /// SYNC path on connectivity failure, keeping the temporary ID
    /// consistent across cache and queue.
    pub async fn save(&self, mut entity: T) -> StoreResult<T> {
        if entity.id().is_empty() {
            entity.set_id(temp_id());
        }

        match self.store_type {
            StoreType::Network => self.save_network(entity).await,
            StoreType::Sync => self.save_sync(entity),
            StoreType::Auto => {
                let fallback = entity.clone();
                match self.save_network(entity).await {
                    Err(error) if error.is_network() => {
                        debug!(
                            collection = %self.collection,
                            entity_id = %fallback.id(),
                            "network unreachable; queueing save"
                        );
                        self.queue.remove(fallback.id());
                        self.save_sync(fallback)
                    }
                    other => other,
                }
            }
        }
    }

    async fn save_network(&self, entity: T) -> StoreResult<T> {
        let saved = if is_temp_id(entity.id()) {
            self.network.create(&self.collection, &entity).await?
        } else {
            self.network
                .update(&self.collection, entity.id(), &entity)
                .await?
        };

        self.mirror_saved(entity.id(), &saved)?;
        Ok(saved)
    }

    /// Mirrors a network save into the cache and settles any stale queue
    /// entry for the entity.
    fn mirror_saved(&self, sent_id: &str, saved: &T) -> StoreResult<()> {
        if saved.id() != sent_id {
            self.cache.rename(&self.collection, sent_id, saved)?;
            self.queue.rename(sent_id, saved.id());
        } else {
            self.cache.put(&self.collection, saved)?;
        }
        self.queue.remove(saved.id());
        Ok(())
    }

    fn save_sync(&self, entity: T) -> StoreResult<T> {
        let action = if entity.is_local_only() {
            WriteAction::Create
        } else {
            WriteAction::Update
        };
        self.cache.put(&self.collection, &entity)?;
        self.queue.enqueue(entity.id(), action);
        Ok(entity)
    }

    // ----- batch save -----

    /// Saves a batch of entities.
    ///
    /// Fails fast on an empty input and on a backend API version too old
    /// for batch insert, before any network call. Inputs already known
    /// to the cache become updates; new ones become creates, chunked to
    /// at most `max_batch_size` per request and submitted sequentially.
    /// Every input position either receives its saved entity or a
    /// per-index error; one item's failure never aborts its siblings.
    pub async fn save_batch(&self, entities: Vec<T>) -> StoreResult<MultiSaveResult<T>> {
        if entities.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        match self.store_type {
            StoreType::Sync => {
                let mut result = MultiSaveResult {
                    entities: Vec::with_capacity(entities.len()),
                    errors: Vec::new(),
                };
                for mut entity in entities {
                    if entity.id().is_empty() {
                        entity.set_id(temp_id());
                    }
                    result.entities.push(Some(self.save_sync(entity)?));
                }
                Ok(result)
            }
            StoreType::Network | StoreType::Auto => self.save_batch_network(entities).await,
        }
    }

    async fn save_batch_network(&self, entities: Vec<T>) -> StoreResult<MultiSaveResult<T>> {
        let actual = self.network.api_version();
        let required = self.config.multi_insert_min_api_version;
        if actual < required {
            return Err(StoreError::IncompatibleApiVersion { required, actual });
        }

        let auto = self.store_type == StoreType::Auto;
        let mut slots: Vec<Option<T>> = vec![None; entities.len()];
        let mut errors: Vec<BatchIndexError> = Vec::new();

        // Cache-known entities are updates; everything else is a create.
        let mut updates: Vec<(usize, T)> = Vec::new();
        let mut creates: Vec<(usize, T)> = Vec::new();
        for (index, mut entity) in entities.into_iter().enumerate() {
            if entity.id().is_empty() {
                entity.set_id(temp_id());
            }
            let known = !is_temp_id(entity.id())
                && self.cache.get(&self.collection, entity.id())?.is_some();
            if known {
                updates.push((index, entity));
            } else {
                creates.push((index, entity));
            }
        }

        for (index, entity) in updates {
            match self
                .network
                .update(&self.collection, entity.id(), &entity)
                .await
            {
                Ok(saved) => {
                    self.mirror_saved(entity.id(), &saved)?;
                    slots[index] = Some(saved);
                }
                Err(error) if auto && error.is_network() => {
                    self.queue.remove(entity.id());
                    slots[index] = Some(self.save_sync(entity)?);
                }
                Err(error) => errors.push(BatchIndexError {
                    index,
                    message: error.to_string(),
                }),
            }
        }

        // Chunks go out sequentially so partial failures keep stable
        // input-index attribution.
        for chunk in creates.chunks(self.config.max_batch_size.max(1)) {
            let payload: Vec<T> = chunk.iter().map(|(_, entity)| entity.clone()).collect();
            match self.network.batch_create(&self.collection, &payload).await {
                Ok(response) => {
                    for (position, saved) in response.entities.into_iter().enumerate() {
                        if let Some(saved) = saved {
                            let (index, ref sent) = chunk[position];
                            self.mirror_saved(sent.id(), &saved)?;
                            slots[index] = Some(saved);
                        }
                    }
                    for error in response.errors {
                        errors.push(BatchIndexError {
                            index: chunk[error.index].0,
                            message: error.message,
                        });
                    }
                }
                Err(error) if auto && error.is_network() => {
                    debug!(
                        collection = %self.collection,
                        chunk_len = chunk.len(),
                        "network unreachable; queueing batch chunk"
                    );
                    for (index, entity) in chunk {
                        self.queue.remove(entity.id());
                        slots[*index] = Some(self.save_sync(entity.clone())?);
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    for (index, _) in chunk {
                        errors.push(BatchIndexError {
                            index: *index,
                            message: message.clone(),
                        });
                    }
                }
            }
        }

        Ok(MultiSaveResult {
            entities: slots,
            errors,
        })
    }

    // ----- find / count -----

    /// Finds entities matching an optional query.
    ///
    /// NETWORK runs the query remotely and mirrors the result set into
    /// the cache. SYNC queries the cache only. AUTO falls back to the
    /// cache result on connectivity failure; any other failure
    /// propagates without fallback.
    pub async fn find(&self, query: Option<&Query>) -> StoreResult<Vec<T>> {
        match self.store_type {
            StoreType::Sync => self.cache.query(&self.collection, query),
            StoreType::Network => {
                self.ensure_supported(query)?;
                self.find_network(query).await
            }
            StoreType::Auto => {
                self.ensure_supported(query)?;
                match self.find_network(query).await {
                    Err(error) if error.is_network() => {
                        debug!(collection = %self.collection, "find falling back to cache");
                        self.cache.query(&self.collection, query)
                    }
                    other => other,
                }
            }
        }
    }

    async fn find_network(&self, query: Option<&Query>) -> StoreResult<Vec<T>> {
        let found = self.network.query(&self.collection, query).await?;
        for entity in &found {
            self.cache.put(&self.collection, entity)?;
        }
        Ok(found)
    }

    /// Finds a single entity by ID.
    ///
    /// The not-found error names the store that actually served the
    /// request: `CacheNotFound` from the cache path, `BackendNotFound`
    /// from the network path.
    pub async fn find_by_id(&self, id: &str) -> StoreResult<T> {
        match self.store_type {
            StoreType::Sync => self.find_by_id_cache(id),
            StoreType::Network => self.find_by_id_network(id).await,
            StoreType::Auto => match self.find_by_id_network(id).await {
                Err(error) if error.is_network() => self.find_by_id_cache(id),
                other => other,
            },
        }
    }

    fn find_by_id_cache(&self, id: &str) -> StoreResult<T> {
        self.cache
            .get(&self.collection, id)?
            .ok_or_else(|| StoreError::cache_not_found(&self.collection, id))
    }

    async fn find_by_id_network(&self, id: &str) -> StoreResult<T> {
        let entity = self.network.get(&self.collection, id).await?;
        self.cache.put(&self.collection, &entity)?;
        Ok(entity)
    }

    /// Counts entities matching an optional query, with the same
    /// dual-path and fallback rules as [`find`](Self::find).
    pub async fn count(&self, query: Option<&Query>) -> StoreResult<u64> {
        match self.store_type {
            StoreType::Sync => self.cache.count(&self.collection, query),
            StoreType::Network => {
                self.ensure_supported(query)?;
                self.network.count(&self.collection, query).await
            }
            StoreType::Auto => {
                self.ensure_supported(query)?;
                match self.network.count(&self.collection, query).await {
                    Err(error) if error.is_network() => self.cache.count(&self.collection, query),
                    other => other,
                }
            }
        }
    }

    // ----- remove -----

    /// Removes a single entity by ID.
    pub async fn remove_by_id(&self, id: &str) -> StoreResult<DeleteResponse> {
        match self.store_type {
            StoreType::Sync => self.remove_by_id_sync(id),
            StoreType::Network => self.remove_by_id_network(id).await,
            StoreType::Auto => match self.remove_by_id_network(id).await {
                Err(error) if error.is_network() => self.remove_by_id_sync(id),
                other => other,
            },
        }
    }

    async fn remove_by_id_network(&self, id: &str) -> StoreResult<DeleteResponse> {
        let count = self.network.delete(&self.collection, id).await?;
        self.cache.delete(&self.collection, id)?;
        self.queue.remove(id);
        Ok(DeleteResponse { count })
    }

    fn remove_by_id_sync(&self, id: &str) -> StoreResult<DeleteResponse> {
        let removed = self.cache.delete(&self.collection, id)?;
        self.queue.enqueue(id, WriteAction::Delete);
        Ok(DeleteResponse {
            count: u64::from(removed),
        })
    }

    /// Removes all entities matching a query.
    ///
    /// Unscoped deletes are disallowed: a missing query and a query
    /// without a filtering predicate are rejected distinctly, both
    /// before any network or cache I/O.
    pub async fn remove(&self, query: Option<&Query>) -> StoreResult<DeleteResponse> {
        let Some(query) = query else {
            return Err(StoreError::MissingQuery);
        };
        if !query.has_filter() {
            return Err(StoreError::MissingWhereClause);
        }

        match self.store_type {
            StoreType::Sync => self.remove_query_sync(query),
            StoreType::Network => {
                self.ensure_supported(Some(query))?;
                self.remove_query_network(query).await
            }
            StoreType::Auto => {
                self.ensure_supported(Some(query))?;
                match self.remove_query_network(query).await {
                    Err(error) if error.is_network() => self.remove_query_sync(query),
                    other => other,
                }
            }
        }
    }

    async fn remove_query_network(&self, query: &Query) -> StoreResult<DeleteResponse> {
        let count = self.network.delete_by_query(&self.collection, query).await?;
        for entity in self.cache.query(&self.collection, Some(query))? {
            self.cache.delete(&self.collection, entity.id())?;
            self.queue.remove(entity.id());
        }
        Ok(DeleteResponse { count })
    }

    fn remove_query_sync(&self, query: &Query) -> StoreResult<DeleteResponse> {
        let matched = self.cache.query(&self.collection, Some(query))?;
        for entity in &matched {
            self.cache.delete(&self.collection, entity.id())?;
            self.queue.enqueue(entity.id(), WriteAction::Delete);
        }
        Ok(DeleteResponse {
            count: matched.len() as u64,
        })
    }

    // ----- aggregation -----

    /// Groups matching entities by a field and reduces an aggregation
    /// field per group.
    ///
    /// A network computation; AUTO degrades to a best-effort in-cache
    /// reduction when the network is unreachable.
    pub async fn group_aggregate(
        &self,
        reduce: ReduceFn,
        group_field: &str,
        agg_field: &str,
        query: Option<&Query>,
    ) -> StoreResult<Vec<Aggregation>> {
        match self.store_type {
            StoreType::Sync => self.group_aggregate_cache(reduce, group_field, agg_field, query),
            StoreType::Network => {
                self.ensure_supported(query)?;
                self.network
                    .group_aggregate(&self.collection, reduce, group_field, agg_field, query)
                    .await
            }
            StoreType::Auto => {
                self.ensure_supported(query)?;
                match self
                    .network
                    .group_aggregate(&self.collection, reduce, group_field, agg_field, query)
                    .await
                {
                    Err(error) if error.is_network() => {
                        debug!(
                            collection = %self.collection,
                            "aggregation falling back to in-cache reduction"
                        );
                        self.group_aggregate_cache(reduce, group_field, agg_field, query)
                    }
                    other => other,
                }
            }
        }
    }

    fn group_aggregate_cache(
        &self,
        reduce: ReduceFn,
        group_field: &str,
        agg_field: &str,
        query: Option<&Query>,
    ) -> StoreResult<Vec<Aggregation>> {
        let items = self.cache.query(&self.collection, query)?;
        group_and_reduce(&items, reduce, group_field, agg_field)
    }

    // ----- sync surface -----

    /// Replays queued mutations against the network.
    pub async fn push(&self) -> StoreResult<PushResult<T>> {
        self.coordinator().push(None).await
    }

    /// Fetches and reconciles remote state into the cache.
    pub async fn pull(&self, query: Option<&Query>) -> StoreResult<PullResult<T>> {
        self.coordinator().pull(query).await
    }

    /// Push, then pull.
    pub async fn sync(&self, query: Option<&Query>) -> StoreResult<SyncOutcome<T>> {
        self.coordinator().sync(query).await
    }

    /// Number of pending writes, optionally restricted to a query.
    pub fn sync_count(&self, query: Option<&Query>) -> StoreResult<u64> {
        self.coordinator().pending_count(query)
    }

    /// Discards pending writes without replaying them. Affected
    /// local-only entities remain cached as orphaned records.
    pub fn purge(&self, query: Option<&Query>) -> StoreResult<u64> {
        self.coordinator().purge(query)
    }

    /// Deletes matching entities from the cache outright, never touching
    /// the network. Pending queue entries for removed entities become
    /// orphans, which push tolerates.
    ///
    /// Cleared state makes tracked delta baselines stale, so they are
    /// dropped; the next pull does a full fetch.
    pub fn clear_cache(&self, query: Option<&Query>) -> StoreResult<u64> {
        let cleared = self.cache.clear(&self.collection, query)?;
        self.manager.tracker().invalidate(&self.collection);
        Ok(cleared)
    }
}
