//! Pending-write queue.
//!
//! The durable log of not-yet-pushed local mutations for one collection.
//! Entries are append-ordered; at most one entry exists per entity ID,
//! with a later write superseding the earlier one in place.

use parking_lot::RwLock;

/// The kind of mutation a pending write will replay against the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    /// Entity must be POSTed (does not exist remotely yet).
    Create,
    /// Entity must be PUT (exists remotely).
    Update,
    /// Entity must be deleted remotely.
    Delete,
}

/// A queued mutation intent for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Collection the entity belongs to.
    pub collection: String,
    /// ID of the entity (temporary for unpushed creates).
    pub entity_id: String,
    /// Mutation to replay.
    pub action: WriteAction,
    /// Append-order sequence number, preserved across supersedes.
    pub sequence: u64,
}

/// The pending-write queue for a single collection.
///
/// Owned by the cache manager and shared between the data store façade
/// (which appends) and the sync coordinator (which drains). Read-modify-
/// write sequences are serialized behind one lock.
#[derive(Debug)]
pub struct SyncQueue {
    collection: String,
    entries: RwLock<Vec<PendingWrite>>,
    next_sequence: RwLock<u64>,
}

impl SyncQueue {
    /// Creates an empty queue for the given collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: RwLock::new(Vec::new()),
            next_sequence: RwLock::new(1),
        }
    }

    /// Returns the collection this queue belongs to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Appends a mutation intent, collapsing with any existing entry for
    /// the same entity ID.
    ///
    /// A later write supersedes the earlier one in place (queue position
    /// is kept). A pending `Create` upgraded by an `Update` stays a
    /// `Create`: the entity still does not exist remotely.
    pub fn enqueue(&self, entity_id: impl Into<String>, action: WriteAction) {
        let entity_id = entity_id.into();
        let mut entries = self.entries.write();

        if let Some(existing) = entries.iter_mut().find(|e| e.entity_id == entity_id) {
            existing.action = match (existing.action, action) {
                (WriteAction::Create, WriteAction::Update) => WriteAction::Create,
                (_, new_action) => new_action,
            };
            return;
        }

        let mut next = self.next_sequence.write();
        entries.push(PendingWrite {
            collection: self.collection.clone(),
            entity_id,
            action,
            sequence: *next,
        });
        *next += 1;
    }

    /// Removes the entry for an entity ID. Returns true if one existed.
    pub fn remove(&self, entity_id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.entity_id != entity_id);
        entries.len() < before
    }

    /// Rekeys the entry for `old_id` to `new_id`, preserving action and
    /// queue position.
    ///
    /// The queue half of the temporary-ID-to-server-ID rewrite.
    pub fn rename(&self, old_id: &str, new_id: impl Into<String>) {
        let new_id = new_id.into();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.entity_id == old_id) {
            entry.entity_id = new_id;
        }
    }

    /// Returns all entries in queue order.
    pub fn get_all(&self) -> Vec<PendingWrite> {
        self.entries.read().clone()
    }

    /// Returns the number of queued entries.
    pub fn count(&self) -> u64 {
        self.entries.read().len() as u64
    }

    /// Returns true if no writes are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes entries without replaying them.
    ///
    /// `ids = None` drops everything. Returns the number of entries
    /// removed.
    pub fn remove_all(&self, ids: Option<&[String]>) -> u64 {
        let mut entries = self.entries.write();
        let before = entries.len();
        match ids {
            None => entries.clear(),
            Some(ids) => entries.retain(|e| !ids.contains(&e.entity_id)),
        }
        (before - entries.len()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_preserves_append_order() {
        let queue = SyncQueue::new("todos");
        queue.enqueue("a", WriteAction::Create);
        queue.enqueue("b", WriteAction::Update);
        queue.enqueue("c", WriteAction::Delete);

        let all = queue.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].entity_id, "a");
        assert_eq!(all[2].entity_id, "c");
        assert!(all[0].sequence < all[1].sequence);
        assert!(all[1].sequence < all[2].sequence);
    }

    #[test]
    fn same_id_collapses_to_one_entry() {
        let queue = SyncQueue::new("todos");
        queue.enqueue("a", WriteAction::Create);
        queue.enqueue("a", WriteAction::Update);
        queue.enqueue("a", WriteAction::Update);

        let all = queue.get_all();
        assert_eq!(all.len(), 1);
        // Entity still does not exist remotely; the create must survive.
        assert_eq!(all[0].action, WriteAction::Create);
    }

    #[test]
    fn delete_supersedes_prior_actions() {
        let queue = SyncQueue::new("todos");
        queue.enqueue("a", WriteAction::Update);
        queue.enqueue("a", WriteAction::Delete);

        let all = queue.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].action, WriteAction::Delete);
    }

    #[test]
    fn remove_and_rename() {
        let queue = SyncQueue::new("todos");
        queue.enqueue("temp-1", WriteAction::Create);
        queue.enqueue("b", WriteAction::Update);

        queue.rename("temp-1", "server-1");
        let all = queue.get_all();
        assert_eq!(all[0].entity_id, "server-1");
        assert_eq!(all[0].action, WriteAction::Create);

        assert!(queue.remove("server-1"));
        assert!(!queue.remove("server-1"));
        assert_eq!(queue.count(), 1);
    }

    #[test]
    fn remove_all_with_and_without_ids() {
        let queue = SyncQueue::new("todos");
        queue.enqueue("a", WriteAction::Create);
        queue.enqueue("b", WriteAction::Create);
        queue.enqueue("c", WriteAction::Delete);

        let removed = queue.remove_all(Some(&["a".to_string(), "c".to_string()]));
        assert_eq!(removed, 2);
        assert_eq!(queue.count(), 1);

        assert_eq!(queue.remove_all(None), 1);
        assert!(queue.is_empty());
    }
}
