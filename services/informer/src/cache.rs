//! The local cache: one informer's point-in-time view of a resource kind.
//! Mutated only by the informer's own state-machine task; handlers and
//! `get_store` read it under the shared lock. Grounded in the same
//! `Arc<RwLock<HashMap<K, V>>>` with small entry-level helper methods used
//! for the in-memory caches elsewhere in this codebase.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use mqtti_protocol::Object;

type Key = (Option<String>, String);

/// The primary map plus a secondary index by namespace, kept under one
/// lock so the two never drift out of sync.
#[derive(Default)]
struct State {
    objects: HashMap<Key, Object>,
    by_namespace: HashMap<Option<String>, HashSet<String>>,
}

impl State {
    fn insert(&mut self, key: Key, object: Object) -> Option<Object> {
        self.by_namespace
            .entry(key.0.clone())
            .or_default()
            .insert(key.1.clone());
        self.objects.insert(key, object)
    }

    fn remove(&mut self, key: &Key) -> Option<Object> {
        if let Some(names) = self.by_namespace.get_mut(&key.0) {
            names.remove(&key.1);
            if names.is_empty() {
                self.by_namespace.remove(&key.0);
            }
        }
        self.objects.remove(key)
    }
}

#[derive(Default)]
pub struct Cache {
    state: RwLock<State>,
}

/// What changed when an object moves from the old cache generation into a
/// new one, used to drive `add`/`update`/`delete` handler firing.
pub enum Delta {
    Added(Object),
    Updated { old: Object, new: Object },
    Deleted(Object),
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Object> {
        self.state.read().unwrap().objects.values().cloned().collect()
    }

    /// All objects in `namespace`, read through the secondary namespace
    /// index rather than scanning the whole cache.
    pub fn snapshot_namespace(&self, namespace: &str) -> Vec<Object> {
        let state = self.state.read().unwrap();
        let Some(names) = state.by_namespace.get(&Some(namespace.to_owned())) else {
            return Vec::new();
        };
        names
            .iter()
            .filter_map(|name| state.objects.get(&(Some(namespace.to_owned()), name.clone())).cloned())
            .collect()
    }

    pub fn get(&self, key: &Key) -> Option<Object> {
        self.state.read().unwrap().objects.get(key).cloned()
    }

    /// Replace the whole cache with `objects`, returning the deltas needed
    /// to bring event handlers up to date: `update` for changed keys, `add`
    /// for new keys, `delete` for keys that disappeared.
    pub fn replace(&self, objects: Vec<Object>) -> Vec<Delta> {
        let mut guard = self.state.write().unwrap();
        let next: HashMap<Key, Object> = objects.into_iter().map(|o| (o.key(), o)).collect();
        let mut deltas = Vec::new();

        for (key, old) in &guard.objects {
            match next.get(key) {
                Some(new) if new != old => {
                    deltas.push(Delta::Updated { old: old.clone(), new: new.clone() });
                }
                Some(_) => {}
                None => deltas.push(Delta::Deleted(old.clone())),
            }
        }
        for (key, new) in &next {
            if !guard.objects.contains_key(key) {
                deltas.push(Delta::Added(new.clone()));
            }
        }

        let mut fresh = State::default();
        for (key, object) in next {
            fresh.insert(key, object);
        }
        *guard = fresh;
        deltas
    }

    /// Apply a single watch event.
    /// `added` with an already-present key is treated as `modified`, and
    /// vice versa; `deleted` for an absent key is dropped silently.
    pub fn apply_added(&self, object: Object) -> Delta {
        let key = object.key();
        let mut guard = self.state.write().unwrap();
        match guard.insert(key, object.clone()) {
            Some(old) => Delta::Updated { old, new: object },
            None => Delta::Added(object),
        }
    }

    pub fn apply_modified(&self, object: Object) -> Delta {
        let key = object.key();
        let mut guard = self.state.write().unwrap();
        match guard.insert(key, object.clone()) {
            Some(old) => Delta::Updated { old, new: object },
            None => Delta::Added(object),
        }
    }

    pub fn apply_deleted(&self, object: &Object) -> Option<Delta> {
        let mut guard = self.state.write().unwrap();
        guard.remove(&object.key()).map(Delta::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(name: &str, rv: &str) -> Object {
        sample_in("default", name, rv)
    }

    fn sample_in(namespace: &str, name: &str, rv: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": namespace, "uid": "u", "resourceVersion": rv},
        }))
        .unwrap()
    }

    #[test]
    fn replace_on_empty_cache_only_fires_add() {
        let cache = Cache::new();
        let deltas = cache.replace(vec![sample("alpha", "1")]);
        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], Delta::Added(_)));
    }

    #[test]
    fn replace_with_identical_list_fires_nothing() {
        let cache = Cache::new();
        cache.replace(vec![sample("alpha", "1")]);
        let deltas = cache.replace(vec![sample("alpha", "1")]);
        assert!(deltas.is_empty());
    }

    #[test]
    fn replace_missing_key_fires_delete() {
        let cache = Cache::new();
        cache.replace(vec![sample("alpha", "1")]);
        let deltas = cache.replace(vec![]);
        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], Delta::Deleted(_)));
    }

    #[test]
    fn apply_added_twice_is_reported_as_modified_the_second_time() {
        let cache = Cache::new();
        let first = cache.apply_added(sample("alpha", "1"));
        assert!(matches!(first, Delta::Added(_)));
        let second = cache.apply_added(sample("alpha", "2"));
        assert!(matches!(second, Delta::Updated { .. }));
    }

    #[test]
    fn apply_deleted_for_absent_key_is_silently_dropped() {
        let cache = Cache::new();
        assert!(cache.apply_deleted(&sample("ghost", "1")).is_none());
    }

    #[test]
    fn snapshot_namespace_is_scoped_by_the_secondary_index() {
        let cache = Cache::new();
        cache.replace(vec![
            sample_in("default", "alpha", "1"),
            sample_in("other", "beta", "1"),
        ]);
        let default_ns = cache.snapshot_namespace("default");
        assert_eq!(default_ns.len(), 1);
        assert_eq!(default_ns[0].metadata.name, "alpha");
        assert!(cache.snapshot_namespace("empty").is_empty());
    }

    #[test]
    fn namespace_index_drops_entry_once_its_last_object_is_deleted() {
        let cache = Cache::new();
        cache.apply_added(sample_in("default", "alpha", "1"));
        cache.apply_deleted(&sample_in("default", "alpha", "1"));
        assert!(cache.snapshot_namespace("default").is_empty());
    }
}
