//! In-memory network data source for testing.

use crate::config::DEFAULT_MULTI_INSERT_MIN_API_VERSION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use offstore_core::{
    group_and_reduce, is_temp_id, Acl, Aggregation, BatchIndexError, BatchInsertResponse,
    DeltaSetResponse, Entity, Kmd, NetworkDataSource, Query, StoreError, StoreResult,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use uuid::Uuid;

/// A mock backend for testing.
///
/// Behaves like a real remote collection endpoint: assigns server IDs on
/// create, stamps `Acl`/`Kmd` metadata, records deletion tombstones for
/// delta queries, and can simulate connectivity loss, scripted failures
/// and per-entity rejections. A request counter lets tests assert that
/// an operation performed no network I/O at all.
pub struct MockNetwork<T> {
    collections: RwLock<HashMap<String, HashMap<String, T>>>,
    tombstones: RwLock<HashMap<String, Vec<(String, DateTime<Utc>)>>>,
    connected: AtomicBool,
    api_version: AtomicU32,
    requests: AtomicU64,
    scripted_failures: Mutex<VecDeque<StoreError>>,
    rejected_ids: RwLock<HashSet<String>>,
    delta_unsupported: AtomicBool,
    user: String,
}

impl<T: Entity> MockNetwork<T> {
    /// Creates a connected mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            api_version: AtomicU32::new(DEFAULT_MULTI_INSERT_MIN_API_VERSION),
            requests: AtomicU64::new(0),
            scripted_failures: Mutex::new(VecDeque::new()),
            rejected_ids: RwLock::new(HashSet::new()),
            delta_unsupported: AtomicBool::new(false),
            user: "mock-user".to_string(),
        }
    }

    /// Simulates connectivity loss or restoration.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Overrides the API version the backend reports.
    pub fn set_api_version(&self, version: u32) {
        self.api_version.store(version, Ordering::SeqCst);
    }

    /// Queues an error to be returned by the next request.
    pub fn fail_next_with(&self, error: StoreError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Makes any create/update of the given entity ID fail with a
    /// backend error.
    pub fn reject_id(&self, id: impl Into<String>) {
        self.rejected_ids.write().insert(id.into());
    }

    /// Makes delta queries fail with a backend rejection, forcing
    /// callers onto the full-fetch fallback.
    pub fn set_delta_unsupported(&self, unsupported: bool) {
        self.delta_unsupported.store(unsupported, Ordering::SeqCst);
    }

    /// Number of requests that reached the backend (including failures).
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Resets the request counter.
    pub fn reset_requests(&self) {
        self.requests.store(0, Ordering::SeqCst);
    }

    /// Every request passes through here: counted, then scripted
    /// failures, then connectivity.
    fn begin(&self) -> StoreResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(StoreError::network("mock backend unreachable"));
        }
        Ok(())
    }

    fn check_rejected(&self, id: &str) -> StoreResult<()> {
        if self.rejected_ids.read().contains(id) {
            return Err(StoreError::backend(400, format!("entity {id} rejected")));
        }
        Ok(())
    }

    /// Create semantics without the request bookkeeping, shared by
    /// `create` and `batch_create`.
    fn insert_entity(&self, collection: &str, entity: &T) -> StoreResult<T> {
        self.check_rejected(entity.id())?;

        let mut saved = entity.clone();
        if saved.id().is_empty() || is_temp_id(saved.id()) {
            saved.set_id(Uuid::new_v4().to_string());
        }

        let now = Utc::now();
        saved.set_kmd(Some(Kmd::created_at(now)));
        saved.set_acl(Some(Acl::for_creator(&self.user)));

        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(saved.id().to_string(), saved.clone());
        Ok(saved)
    }

    fn all(&self, collection: &str) -> Vec<T> {
        self.collections
            .read()
            .get(collection)
            .map(|entities| entities.values().cloned().collect())
            .unwrap_or_default()
    }

    fn record_tombstone(&self, collection: &str, id: &str) {
        self.tombstones
            .write()
            .entry(collection.to_string())
            .or_default()
            .push((id.to_string(), Utc::now()));
    }
}

impl<T: Entity> Default for MockNetwork<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> NetworkDataSource<T> for MockNetwork<T> {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<T> {
        self.begin()?;
        self.collections
            .read()
            .get(collection)
            .and_then(|entities| entities.get(id))
            .cloned()
            .ok_or_else(|| StoreError::backend_not_found(collection, id))
    }

    async fn create(&self, collection: &str, entity: &T) -> StoreResult<T> {
        self.begin()?;
        self.insert_entity(collection, entity)
    }

    async fn update(&self, collection: &str, id: &str, entity: &T) -> StoreResult<T> {
        self.begin()?;
        self.check_rejected(id)?;

        let now = Utc::now();
        let mut saved = entity.clone();
        saved.set_id(id.to_string());

        // PUT upserts; creation time survives an update of an existing
        // entity.
        let existing_ect = self
            .collections
            .read()
            .get(collection)
            .and_then(|entities| entities.get(id))
            .and_then(|e| e.kmd().map(|kmd| kmd.ect));
        let kmd = match existing_ect {
            Some(ect) => Kmd::created_at(ect).touched(now),
            None => Kmd::created_at(now),
        };
        saved.set_kmd(Some(kmd));
        if saved.acl().is_none() {
            saved.set_acl(Some(Acl::for_creator(&self.user)));
        }

        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), saved.clone());
        Ok(saved)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<u64> {
        self.begin()?;
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|entities| entities.remove(id))
            .is_some();
        if removed {
            self.record_tombstone(collection, id);
            Ok(1)
        } else {
            // Idempotent delete: already gone is a zero-count success.
            Ok(0)
        }
    }

    async fn delete_by_query(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        self.begin()?;
        let matched = query.apply(self.all(collection))?;

        let mut removed = 0;
        let mut collections = self.collections.write();
        if let Some(entities) = collections.get_mut(collection) {
            for entity in &matched {
                if entities.remove(entity.id()).is_some() {
                    removed += 1;
                }
            }
        }
        drop(collections);

        for entity in &matched {
            self.record_tombstone(collection, entity.id());
        }
        Ok(removed)
    }

    async fn query(&self, collection: &str, query: Option<&Query>) -> StoreResult<Vec<T>> {
        self.begin()?;
        let all = self.all(collection);
        match query {
            Some(q) => q.apply(all),
            None => Ok(all),
        }
    }

    async fn count(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64> {
        self.begin()?;
        let all = self.all(collection);
        match query {
            Some(q) => Ok(q.apply(all)?.len() as u64),
            None => Ok(all.len() as u64),
        }
    }

    async fn batch_create(
        &self,
        collection: &str,
        entities: &[T],
    ) -> StoreResult<BatchInsertResponse<T>> {
        self.begin()?;

        let mut saved = Vec::with_capacity(entities.len());
        let mut errors = Vec::new();
        for (index, entity) in entities.iter().enumerate() {
            match self.insert_entity(collection, entity) {
                Ok(entity) => saved.push(Some(entity)),
                Err(error) => {
                    saved.push(None);
                    errors.push(BatchIndexError {
                        index,
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(BatchInsertResponse {
            entities: saved,
            errors,
        })
    }

    async fn group_aggregate(
        &self,
        collection: &str,
        reduce: offstore_core::ReduceFn,
        group_field: &str,
        agg_field: &str,
        query: Option<&Query>,
    ) -> StoreResult<Vec<Aggregation>> {
        self.begin()?;
        let all = self.all(collection);
        let items = match query {
            Some(q) => q.apply(all)?,
            None => all,
        };
        group_and_reduce(&items, reduce, group_field, agg_field)
    }

    async fn delta_query(
        &self,
        collection: &str,
        query: Option<&Query>,
        since: DateTime<Utc>,
    ) -> StoreResult<DeltaSetResponse<T>> {
        self.begin()?;
        if self.delta_unsupported.load(Ordering::SeqCst) {
            return Err(StoreError::backend(
                400,
                "delta set is not supported for this collection",
            ));
        }

        let mut changed = Vec::new();
        for entity in self.all(collection) {
            let modified_since = entity.kmd().is_some_and(|kmd| kmd.lmt > since);
            if !modified_since {
                continue;
            }
            let matches = match query {
                Some(q) => q.matches_entity(&entity)?,
                None => true,
            };
            if matches {
                changed.push(entity);
            }
        }

        let mut deleted_ids = Vec::new();
        if let Some(tombstones) = self.tombstones.read().get(collection) {
            for (id, at) in tombstones {
                if *at > since && !deleted_ids.contains(id) {
                    deleted_ids.push(id.clone());
                }
            }
        }

        Ok(DeltaSetResponse {
            changed,
            deleted_ids,
        })
    }

    fn api_version(&self) -> u32 {
        self.api_version.load(Ordering::SeqCst)
    }
}
