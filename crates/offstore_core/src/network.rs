//! Network data source contract.
//!
//! The remote side of the store is consumed as an abstract interface;
//! HTTP transport, retries and authentication live behind it. Every call
//! either returns a result or fails with a
//! [`StoreError`](crate::error::StoreError) whose category tells the
//! caller whether the server rejected the request (`Backend`) or could
//! not be reached at all (`Network`).

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::query::Query;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-index error from a batch insert.
///
/// Errors never abort sibling items; the index ties the failure back to
/// the caller's input position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchIndexError {
    /// Position of the failed entity in the submitted batch.
    pub index: usize,
    /// Backend-supplied error message.
    pub message: String,
}

/// Result of a batch insert: one slot per submitted entity, position
/// aligned with the input, plus per-index errors for the `None` slots.
#[derive(Debug, Clone)]
pub struct BatchInsertResponse<T> {
    /// Saved entities, `None` where the item failed.
    pub entities: Vec<Option<T>>,
    /// Errors for the failed positions.
    pub errors: Vec<BatchIndexError>,
}

/// Response to a delta query: entities changed since the reference
/// timestamp plus IDs deleted since then.
#[derive(Debug, Clone)]
pub struct DeltaSetResponse<T> {
    /// Entities created or modified since the reference timestamp.
    pub changed: Vec<T>,
    /// IDs of entities deleted since the reference timestamp.
    pub deleted_ids: Vec<String>,
}

/// Reduction applied per group by [`NetworkDataSource::group_aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceFn {
    /// Number of entities in the group.
    Count,
    /// Sum of the aggregation field.
    Sum,
    /// Minimum of the aggregation field.
    Min,
    /// Maximum of the aggregation field.
    Max,
    /// Arithmetic mean of the aggregation field.
    Average,
}

impl ReduceFn {
    /// Applies the reduction to the collected per-group values.
    #[must_use]
    pub fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            ReduceFn::Count => values.len() as f64,
            ReduceFn::Sum => values.iter().sum(),
            ReduceFn::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            ReduceFn::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ReduceFn::Average => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
        }
    }
}

/// One group's aggregation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Value of the grouping field for this group.
    pub group: Value,
    /// Reduced value for this group.
    pub result: f64,
}

/// Groups entities by a field and reduces an aggregation field per group.
///
/// This is the reference reduction used by in-memory backends and by the
/// AUTO-mode best-effort fallback when the network is unreachable. Groups
/// are returned in a deterministic order (sorted by encoded group key).
pub fn group_and_reduce<T: Entity>(
    items: &[T],
    reduce: ReduceFn,
    group_field: &str,
    agg_field: &str,
) -> StoreResult<Vec<Aggregation>> {
    let mut groups: BTreeMap<String, (Value, Vec<f64>)> = BTreeMap::new();

    for item in items {
        let value = serde_json::to_value(item)?;
        let group = value.get(group_field).cloned().unwrap_or(Value::Null);
        let key = serde_json::to_string(&group)?;
        let entry = groups.entry(key).or_insert_with(|| (group, Vec::new()));

        match reduce {
            // Count ignores the aggregation field entirely.
            ReduceFn::Count => entry.1.push(0.0),
            _ => {
                if let Some(v) = value.get(agg_field).and_then(Value::as_f64) {
                    entry.1.push(v);
                }
            }
        }
    }

    Ok(groups
        .into_values()
        .map(|(group, values)| Aggregation {
            group,
            result: reduce.reduce(&values),
        })
        .collect())
}

/// Remote CRUD, query and aggregation operations for one backend.
///
/// Implementations surface HTTP-level failures as structured errors:
/// a completed call with a non-2xx status maps to
/// [`StoreError::Backend`](crate::error::StoreError::Backend) (404 on
/// [`get`](Self::get) maps to `BackendNotFound`), while an unreachable
/// host or a timeout maps to
/// [`StoreError::Network`](crate::error::StoreError::Network).
#[async_trait]
pub trait NetworkDataSource<T: Entity>: Send + Sync {
    /// Fetches a single entity by ID.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<T>;

    /// Creates an entity, returning it with server-assigned ID and
    /// metadata.
    async fn create(&self, collection: &str, entity: &T) -> StoreResult<T>;

    /// Updates an entity by ID, returning it with refreshed metadata.
    async fn update(&self, collection: &str, id: &str, entity: &T) -> StoreResult<T>;

    /// Deletes an entity by ID.
    ///
    /// Idempotent: deleting an already-absent entity succeeds with a
    /// count of zero.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<u64>;

    /// Deletes all entities matching the query, returning the count.
    async fn delete_by_query(&self, collection: &str, query: &Query) -> StoreResult<u64>;

    /// Runs a query, returning all matching entities.
    async fn query(&self, collection: &str, query: Option<&Query>) -> StoreResult<Vec<T>>;

    /// Counts entities matching the query.
    async fn count(&self, collection: &str, query: Option<&Query>) -> StoreResult<u64>;

    /// Inserts a batch of entities in one request.
    ///
    /// Per-item failures are reported in the response, never as an
    /// error for the whole batch.
    async fn batch_create(
        &self,
        collection: &str,
        entities: &[T],
    ) -> StoreResult<BatchInsertResponse<T>>;

    /// Groups matching entities and reduces an aggregation field per
    /// group.
    async fn group_aggregate(
        &self,
        collection: &str,
        reduce: ReduceFn,
        group_field: &str,
        agg_field: &str,
        query: Option<&Query>,
    ) -> StoreResult<Vec<Aggregation>>;

    /// Fetches only entities changed since `since`, plus IDs deleted
    /// since then.
    async fn delta_query(
        &self,
        collection: &str,
        query: Option<&Query>,
        since: DateTime<Utc>,
    ) -> StoreResult<DeltaSetResponse<T>>;

    /// API version the backend speaks. Batch insert requires a minimum
    /// version; the store fails fast when the backend is older.
    fn api_version(&self) -> u32;
}
