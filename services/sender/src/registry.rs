//! The active-watch registry: one entry per in-flight watch, keyed by
//! request id. Grounded in the same `Arc<RwLock<HashMap<String, Sender<_>>>>`
//! shape used for command-sender bookkeeping elsewhere in this codebase,
//! swapped for a plain `Mutex` since entries here are cancellation handles
//! rather than channels that need concurrent send access.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// A mapping from request id to the cancellation handle for its watch.
/// Guarded by a single mutex.
#[derive(Default)]
pub struct ActiveWatchRegistry {
    inner: Mutex<HashMap<String, CancellationToken>>,
}

impl ActiveWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new watch, returning its cancellation token.
    pub fn insert(&self, id: String) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner.lock().unwrap().insert(id, token.clone());
        token
    }

    /// Cancel and remove the watch for `id`. A missing id is silently
    /// ignored.
    pub fn stop(&self, id: &str) {
        if let Some(token) = self.inner.lock().unwrap().remove(id) {
            token.cancel();
        }
    }

    /// Remove the entry for `id` without cancelling (the watch already
    /// terminated on its own).
    pub fn remove(&self, id: &str) {
        self.inner.lock().unwrap().remove(id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, token) in inner.drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_unknown_id_is_a_silent_no_op() {
        let registry = ActiveWatchRegistry::new();
        registry.stop("missing");
        assert!(registry.is_empty());
    }

    #[test]
    fn insert_then_stop_cancels_token_and_removes_entry() {
        let registry = ActiveWatchRegistry::new();
        let token = registry.insert("req-1".to_owned());
        assert_eq!(registry.len(), 1);
        registry.stop("req-1");
        assert!(token.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_all_cancels_every_registered_token() {
        let registry = ActiveWatchRegistry::new();
        let a = registry.insert("a".to_owned());
        let b = registry.insert("b".to_owned());
        registry.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(registry.is_empty());
    }
}
