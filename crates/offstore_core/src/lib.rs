//! # offstore core
//!
//! Entity model, query AST and collaborator contracts for the offstore
//! offline-first data store.
//!
//! This crate provides:
//! - The [`Entity`] trait with backend metadata ([`Acl`], [`Kmd`]) and
//!   temporary-ID handling
//! - A portable, serializable [`Query`] AST with local evaluation
//! - The [`StoreError`] taxonomy (backend / network / cache / validation)
//! - The [`NetworkDataSource`] and [`CacheStore`] collaborator traits
//! - An in-memory [`MemoryCache`] implementation
//!
//! The synchronization engine itself (pending-write queue, delta-set
//! tracking, push/pull coordination, the mode-dispatching store façade)
//! lives in `offstore_sync` and consumes these contracts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod entity;
mod error;
mod network;
mod query;

pub use cache::{CacheStore, MemoryCache};
pub use entity::{is_temp_id, temp_id, Acl, Entity, Kmd, TEMP_ID_PREFIX};
pub use error::{StoreError, StoreResult};
pub use network::{
    group_and_reduce, Aggregation, BatchIndexError, BatchInsertResponse, DeltaSetResponse,
    NetworkDataSource, ReduceFn,
};
pub use query::{Filter, Query, SortField};
