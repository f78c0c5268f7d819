//! # offstore sync
//!
//! Offline-first synchronization engine for offstore: a pending-write
//! queue, delta-set query tracking, a push/pull/sync coordinator and a
//! mode-dispatching [`DataStore`] façade over the `offstore_core`
//! collaborator contracts.
//!
//! A store is constructed per collection with a [`StoreType`]:
//! - [`StoreType::Network`] goes straight to the backend and mirrors
//!   results into the cache
//! - [`StoreType::Sync`] operates on the cache only and queues
//!   mutations for a later [`DataStore::push`]
//! - [`StoreType::Auto`] tries the network and falls back to the sync
//!   behavior on connectivity failures
//!
//! ```no_run
//! use offstore_sync::{CacheManager, DataStore, MockNetwork, StoreType};
//! use offstore_core::MemoryCache;
//! use std::sync::Arc;
//! # use serde::{Deserialize, Serialize};
//! # use offstore_core::{Acl, Entity, Kmd};
//! # #[derive(Clone, Serialize, Deserialize)]
//! # struct Todo { id: String, acl: Option<Acl>, kmd: Option<Kmd> }
//! # impl Entity for Todo {
//! #     fn id(&self) -> &str { &self.id }
//! #     fn set_id(&mut self, id: String) { self.id = id; }
//! #     fn acl(&self) -> Option<&Acl> { self.acl.as_ref() }
//! #     fn set_acl(&mut self, acl: Option<Acl>) { self.acl = acl; }
//! #     fn kmd(&self) -> Option<&Kmd> { self.kmd.as_ref() }
//! #     fn set_kmd(&mut self, kmd: Option<Kmd>) { self.kmd = kmd; }
//! # }
//!
//! # async fn demo() -> Result<(), offstore_core::StoreError> {
//! let network = Arc::new(MockNetwork::<Todo>::new());
//! let cache = Arc::new(MemoryCache::new());
//! let manager = Arc::new(CacheManager::new());
//!
//! let store = DataStore::new("todos", StoreType::Auto, network, cache, manager);
//! let saved = store.save(Todo { id: String::new(), acl: None, kmd: None }).await?;
//! let outcome = store.sync(None).await?;
//! # let _ = (saved, outcome);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod manager;
mod mock;
mod query_cache;
mod store;
mod sync_queue;

pub use config::{StoreConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MULTI_INSERT_MIN_API_VERSION};
pub use coordinator::{PullResult, PushResult, SyncCoordinator, SyncOutcome};
pub use manager::CacheManager;
pub use mock::MockNetwork;
pub use query_cache::QueryCacheTracker;
pub use store::{DataStore, DeleteResponse, MultiSaveResult, StoreType};
pub use sync_queue::{PendingWrite, SyncQueue, WriteAction};
