// ── Entity caches ──
//
// The four id -> record maps an `AppClient` keeps. They exist from
// construction, are merged into and never cleared.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Ambulance, Base, Call, Entity, EntityId, Hospital};
use crate::stream::EntityStream;

/// Local read cache of ambulances, hospitals, calls and bases.
///
/// Thread-safe: reads are wait-free, writes take per-shard locks within
/// `DashMap`. Mutations are broadcast to subscribers via `watch` channels.
pub struct DataStore {
    pub(crate) ambulances: EntityCollection<Ambulance>,
    pub(crate) hospitals: EntityCollection<Hospital>,
    pub(crate) calls: EntityCollection<Call>,
    pub(crate) bases: EntityCollection<Base>,
    pub(crate) last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_update, _) = watch::channel(None);

        Self {
            ambulances: EntityCollection::new(),
            hospitals: EntityCollection::new(),
            calls: EntityCollection::new(),
            bases: EntityCollection::new(),
            last_update,
        }
    }

    /// Upsert any cached record type. Returns `true` when content changed.
    pub(crate) fn upsert<E: Cached>(&self, entity: E) -> bool {
        let id = entity.id().clone();
        let changed = E::collection(self).upsert(id, entity);
        if changed {
            self.last_update.send_replace(Some(Utc::now()));
        }
        changed
    }

    pub(crate) fn get<E: Cached>(&self, id: &EntityId) -> Option<Arc<E>> {
        E::collection(self).get(id)
    }

    pub(crate) fn snapshot<E: Cached>(&self) -> Arc<Vec<Arc<E>>> {
        E::collection(self).snapshot()
    }

    pub(crate) fn subscribe<E: Cached>(&self) -> EntityStream<E> {
        EntityStream::new(E::collection(self).subscribe())
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn ambulances_snapshot(&self) -> Arc<Vec<Arc<Ambulance>>> {
        self.ambulances.snapshot()
    }

    pub fn hospitals_snapshot(&self) -> Arc<Vec<Arc<Hospital>>> {
        self.hospitals.snapshot()
    }

    pub fn calls_snapshot(&self) -> Arc<Vec<Arc<Call>>> {
        self.calls.snapshot()
    }

    pub fn bases_snapshot(&self) -> Arc<Vec<Arc<Base>>> {
        self.bases.snapshot()
    }

    // ── Single-record lookups ────────────────────────────────────────

    pub fn ambulance(&self, id: &EntityId) -> Option<Arc<Ambulance>> {
        self.ambulances.get(id)
    }

    pub fn hospital(&self, id: &EntityId) -> Option<Arc<Hospital>> {
        self.hospitals.get(id)
    }

    pub fn call(&self, id: &EntityId) -> Option<Arc<Call>> {
        self.calls.get(id)
    }

    pub fn base(&self, id: &EntityId) -> Option<Arc<Base>> {
        self.bases.get(id)
    }

    pub fn contains_call(&self, id: &EntityId) -> bool {
        self.calls.contains(id)
    }

    pub fn call_ids(&self) -> Vec<EntityId> {
        self.calls.ids()
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn ambulance_count(&self) -> usize {
        self.ambulances.len()
    }

    pub fn hospital_count(&self) -> usize {
        self.hospitals.len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn base_count(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ambulances.is_empty()
            && self.hospitals.is_empty()
            && self.calls.is_empty()
            && self.bases.is_empty()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_ambulances(&self) -> EntityStream<Ambulance> {
        self.subscribe()
    }

    pub fn subscribe_hospitals(&self) -> EntityStream<Hospital> {
        self.subscribe()
    }

    pub fn subscribe_calls(&self) -> EntityStream<Call> {
        self.subscribe()
    }

    pub fn subscribe_bases(&self) -> EntityStream<Base> {
        self.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    /// When any cache last changed content.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    pub fn subscribe_last_update(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_update.subscribe()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a record type to its collection in the [`DataStore`].
pub(crate) trait Cached: Entity {
    fn collection(store: &DataStore) -> &EntityCollection<Self>;
}

impl Cached for Ambulance {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.ambulances
    }
}

impl Cached for Hospital {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.hospitals
    }
}

impl Cached for Call {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.calls
    }
}

impl Cached for Base {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.bases
    }
}
