// ── Generic reactive keyed collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection of entities keyed by `K`.
///
/// Uses `DashMap` for concurrent lookups and `watch` channels for
/// push-based change notification. Every mutation bumps a version counter
/// and rebuilds the key-ordered snapshot that subscribers receive.
pub(crate) struct EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot ordered by key, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: K, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &K) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        self.by_key.clear();
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Number of mutations applied since creation.
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values in key order and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_key() {
        let col: EntityCollection<String, String> = EntityCollection::new();
        assert!(col.upsert("key1".into(), "hello".into()));
    }

    #[test]
    fn upsert_returns_false_for_existing_key() {
        let col: EntityCollection<String, String> = EntityCollection::new();
        col.upsert("key1".into(), "hello".into());
        assert!(!col.upsert("key1".into(), "world".into()));
        assert_eq!(*col.get(&"key1".into()).unwrap(), "world");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let col: EntityCollection<String, String> = EntityCollection::new();
        col.upsert("a".into(), "x".into());
        let before = col.version();

        assert!(col.remove(&"zzz".into()).is_none());
        assert_eq!(col.version(), before);
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let col: EntityCollection<String, String> = EntityCollection::new();
        col.upsert("a".into(), "x".into());
        col.upsert("b".into(), "y".into());

        col.clear();
        assert!(col.is_empty());
        assert!(col.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_key_ordered() {
        let col: EntityCollection<String, &'static str> = EntityCollection::new();
        col.upsert("c".into(), "third");
        col.upsert("a".into(), "first");
        col.upsert("b".into(), "second");

        let snap = col.snapshot();
        let values: Vec<&str> = snap.iter().map(|v| **v).collect();
        assert_eq!(values, vec!["first", "second", "third"]);
    }

    #[test]
    fn subscribers_see_mutations() {
        let col: EntityCollection<String, String> = EntityCollection::new();
        let mut rx = col.subscribe();
        assert!(!rx.has_changed().unwrap());

        col.upsert("a".into(), "x".into());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
