// ── Reactive record collection ──
//
// Concurrent id -> record storage with push-based change notification
// via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::EntityId;

/// Concurrent, reactive cache for one record type.
///
/// Every effective mutation bumps a version counter and rebuilds the
/// snapshot (sorted by id) that subscribers receive. Writing a record
/// identical to the cached one is a no-op and notifies nobody.
pub(crate) struct EntityCollection<T: Clone + PartialEq + Send + Sync + 'static> {
    by_id: DashMap<EntityId, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or overwrite the record stored under `id`.
    ///
    /// Returns `true` when the cache content changed.
    pub(crate) fn upsert(&self, id: EntityId, entity: T) -> bool {
        if self
            .by_id
            .get(&id)
            .is_some_and(|existing| **existing == entity)
        {
            return false;
        }

        self.by_id.insert(id, Arc::new(entity));
        self.rebuild_snapshot();
        self.bump_version();
        true
    }

    pub(crate) fn get(&self, id: &EntityId) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &EntityId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub(crate) fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.by_id.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(EntityId, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
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
    fn upsert_reports_change() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert(EntityId::Int(1), "hello".into()));
        assert!(col.upsert(EntityId::Int(1), "world".into()));
        assert_eq!(*col.get(&EntityId::Int(1)).unwrap(), "world");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn identical_upsert_is_idempotent() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert(EntityId::Int(1), "hello".into());
        let version = col.version();

        for _ in 0..3 {
            assert!(!col.upsert(EntityId::Int(1), "hello".into()));
        }
        assert_eq!(col.version(), version);
        assert_eq!(col.len(), 1);
        assert_eq!(*col.get(&EntityId::Int(1)).unwrap(), "hello");
    }

    #[test]
    fn snapshot_is_sorted_by_id() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.snapshot().is_empty());

        col.upsert(EntityId::Int(3), "c".into());
        col.upsert(EntityId::Int(1), "a".into());
        col.upsert(EntityId::Int(2), "b".into());

        let snap: Vec<String> = col.snapshot().iter().map(|s| (**s).clone()).collect();
        assert_eq!(snap, ["a", "b", "c"]);
        assert_eq!(col.ids(), [EntityId::Int(1), EntityId::Int(2), EntityId::Int(3)]);
    }

    #[test]
    fn subscribers_see_changes() {
        let col: EntityCollection<String> = EntityCollection::new();
        let mut rx = col.subscribe();
        col.upsert(EntityId::from("x"), "v".into());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        col.upsert(EntityId::from("x"), "v".into());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn contains_and_empty() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.is_empty());
        col.upsert(EntityId::Int(9), "call".into());
        assert!(col.contains(&EntityId::from("9")));
        assert!(!col.contains(&EntityId::Int(10)));
    }
}
