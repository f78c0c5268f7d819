//! End-to-end scenarios across store modes, the pending-write queue and
//! the sync coordinator.

use offstore_core::{
    is_temp_id, Acl, CacheStore, Entity, Kmd, MemoryCache, NetworkDataSource, Query,
};
use offstore_sync::{CacheManager, DataStore, MockNetwork, StoreConfig, StoreType, WriteAction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ToDo {
    id: String,
    name: String,
    details: String,
    due_date: String,
    acl: Option<Acl>,
    kmd: Option<Kmd>,
}

impl ToDo {
    fn new(name: &str, details: &str, due_date: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            details: details.to_string(),
            due_date: due_date.to_string(),
            acl: None,
            kmd: None,
        }
    }
}

impl Entity for ToDo {
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

struct Env {
    network: Arc<MockNetwork<ToDo>>,
    cache: Arc<MemoryCache<ToDo>>,
    manager: Arc<CacheManager>,
}

impl Env {
    fn new() -> Self {
        Self {
            network: Arc::new(MockNetwork::new()),
            cache: Arc::new(MemoryCache::new()),
            manager: Arc::new(CacheManager::new()),
        }
    }

    fn store(&self, store_type: StoreType) -> DataStore<ToDo, MockNetwork<ToDo>, MemoryCache<ToDo>> {
        DataStore::new(
            "todos",
            store_type,
            Arc::clone(&self.network),
            Arc::clone(&self.cache),
            Arc::clone(&self.manager),
        )
    }
}

#[tokio::test]
async fn online_saves_are_visible_across_modes() {
    let env = Env::new();
    let auto = env.store(StoreType::Auto);

    auto.save(ToDo::new("groceries", "milk, eggs", "2026-09-01"))
        .await
        .unwrap();
    auto.save(ToDo::new("dentist", "annual checkup", "2026-09-14"))
        .await
        .unwrap();
    auto.save(ToDo::new("taxes", "file extension", "2026-10-15"))
        .await
        .unwrap();

    // Online saves went through the network and mirrored into the cache,
    // so a SYNC store on the same cache sees all three offline.
    let sync = env.store(StoreType::Sync);
    let local = sync.find(None).await.unwrap();
    assert_eq!(local.len(), 3);
    assert!(local.iter().all(|t| !is_temp_id(t.id())));
    assert!(sync.sync_count(None).unwrap() == 0);

    // The network copy carries backend-populated metadata.
    let network = env.store(StoreType::Network);
    let remote = network.find(None).await.unwrap();
    assert_eq!(remote.len(), 3);
    for todo in &remote {
        assert!(todo.acl().is_some());
        let kmd = todo.kmd().unwrap();
        assert!(kmd.lmt >= kmd.ect);
    }
}

#[tokio::test]
async fn offline_saves_queue_and_push_replays_them() {
    let env = Env::new();
    let store = env.store(StoreType::Sync);

    let a = store
        .save(ToDo::new("water plants", "", "2026-08-25"))
        .await
        .unwrap();
    let b = store
        .save(ToDo::new("oil change", "", "2026-08-30"))
        .await
        .unwrap();
    assert!(is_temp_id(a.id()));
    assert!(is_temp_id(b.id()));

    let queue = env.manager.queue("todos");
    let pending = queue.get_all();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|e| e.action == WriteAction::Create));
    assert_eq!(env.network.requests(), 0);

    let result = store.push().await.unwrap();
    assert_eq!(result.push_count, 2);
    assert!(result.errors.is_empty());
    assert!(queue.is_empty());

    // Temporary IDs were rewritten in place.
    let cached = env.cache.query("todos", None).unwrap();
    assert_eq!(cached.len(), 2);
    assert!(cached.iter().all(|t| !is_temp_id(t.id())));
    assert_eq!(env.network.count("todos", None).await.unwrap(), 2);
}

#[tokio::test]
async fn remove_by_query_deletes_matching_subset() {
    let env = Env::new();
    let store = env.store(StoreType::Network);

    store
        .save(ToDo::new("a", "shared", "2026-09-01"))
        .await
        .unwrap();
    store
        .save(ToDo::new("b", "shared", "2026-09-02"))
        .await
        .unwrap();
    let survivor = store
        .save(ToDo::new("c", "solo", "2026-09-03"))
        .await
        .unwrap();

    let query = Query::new().eq("details", "shared");
    let response = store.remove(Some(&query)).await.unwrap();
    assert_eq!(response.count, 2);

    let remote = store.find(None).await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].id(), survivor.id());
    let local = env.cache.query("todos", None).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id(), survivor.id());
}

#[tokio::test]
async fn auto_mode_rides_out_an_outage() {
    let env = Env::new();
    let store = env.store(StoreType::Auto);

    let online = store
        .save(ToDo::new("before outage", "", "2026-08-26"))
        .await
        .unwrap();
    assert!(!is_temp_id(online.id()));

    env.network.set_connected(false);
    let offline = store
        .save(ToDo::new("during outage", "", "2026-08-27"))
        .await
        .unwrap();
    assert!(is_temp_id(offline.id()));
    assert_eq!(store.sync_count(None).unwrap(), 1);

    // Reads keep working from the cache.
    let seen = store.find(None).await.unwrap();
    assert_eq!(seen.len(), 2);

    env.network.set_connected(true);
    let outcome = store.sync(None).await.unwrap();
    assert_eq!(outcome.push.push_count, 1);
    assert!(outcome.push.errors.is_empty());
    assert_eq!(outcome.pull.pull_count, 2);
    assert_eq!(store.sync_count(None).unwrap(), 0);
    assert_eq!(env.network.count("todos", None).await.unwrap(), 2);
}

#[tokio::test]
async fn delta_sync_converges_two_clients() {
    let env_a = Env::new();
    let network = Arc::clone(&env_a.network);

    // A second client shares the backend but has its own cache and queue.
    let env_b = Env {
        network: Arc::clone(&network),
        cache: Arc::new(MemoryCache::new()),
        manager: Arc::new(CacheManager::new()),
    };

    let delta = StoreConfig::new().with_delta_set(true);
    let a = env_a.store(StoreType::Auto).with_config(delta.clone());
    let b = env_b.store(StoreType::Auto).with_config(delta);

    a.save(ToDo::new("from a", "", "2026-09-01")).await.unwrap();
    let first = b.pull(None).await.unwrap();
    assert_eq!(first.pull_count, 1);

    a.save(ToDo::new("also from a", "", "2026-09-02"))
        .await
        .unwrap();
    let second = b.pull(None).await.unwrap();
    // Only the new entity travels on the delta fetch.
    assert_eq!(second.pull_count, 1);
    assert_eq!(env_b.cache.count("todos", None).unwrap(), 2);
}

#[tokio::test]
async fn pull_refuses_while_writes_are_pending() {
    let env = Env::new();
    let store = env.store(StoreType::Sync);

    store
        .save(ToDo::new("unpushed", "", "2026-08-28"))
        .await
        .unwrap();

    let err = store.pull(None).await.unwrap_err();
    assert!(matches!(
        err,
        offstore_core::StoreError::PendingWrites { count: 1 }
    ));
    assert_eq!(env.network.requests(), 0);

    store.push().await.unwrap();
    assert!(store.pull(None).await.is_ok());
}
