// ── Topic observer ──
//
// Plain topic -> callbacks registry. Keys are matched literally: a
// callback registered under `ambulance/+/data` only fires for a
// broadcast on exactly that string.

use std::sync::Arc;

use dashmap::DashMap;

/// A registered callback. Identity (for [`TopicObserver::remove`]) is the
/// `Arc` pointer, so keep a clone of the handle you registered.
pub type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Registry mapping a topic key to the callbacks interested in it.
pub struct TopicObserver<P> {
    observers: DashMap<String, Vec<Callback<P>>>,
}

impl<P> TopicObserver<P> {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
        }
    }

    /// Register `callback` under `key`. The same callback may be
    /// registered more than once and will then fire once per registration.
    pub fn observe(&self, key: impl Into<String>, callback: Callback<P>) {
        self.observers.entry(key.into()).or_default().push(callback);
    }

    /// Remove one registration of `callback` under `key`. No-op if absent.
    pub fn remove(&self, key: &str, callback: &Callback<P>) {
        let emptied = match self.observers.get_mut(key) {
            Some(mut list) => {
                if let Some(pos) = list.iter().position(|cb| Arc::ptr_eq(cb, callback)) {
                    list.remove(pos);
                }
                list.is_empty()
            }
            None => return,
        };
        if emptied {
            self.observers.remove_if(key, |_, list| list.is_empty());
        }
    }

    /// Invoke every callback registered under `key`, in registration order.
    ///
    /// The list is copied before any callback runs, so callbacks may
    /// register or remove observers without deadlocking; such changes
    /// take effect from the next broadcast.
    pub fn broadcast(&self, key: &str, payload: &P) {
        let callbacks = match self.observers.get(key) {
            Some(list) => list.clone(),
            None => return,
        };
        for callback in &callbacks {
            callback(payload);
        }
    }

    /// Number of callbacks registered under `key`.
    pub fn count(&self, key: &str) -> usize {
        self.observers.get(key).map_or(0, |list| list.len())
    }

    /// Keys with at least one callback for which `accept` holds, sorted.
    pub fn keys_matching(&self, accept: impl Fn(&str) -> bool) -> Vec<String> {
        let mut keys: Vec<String> = self
            .observers
            .iter()
            .filter(|e| accept(e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<P> Default for TopicObserver<P> {
    fn default() -> Self {
        Self::new()
    }
}
