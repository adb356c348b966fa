//! The pending-request registry: one entry per in-flight request id,
//! buffering frames dispatched from the payload-topic subscription to the
//! informer task that issued the request. Grounded in the request/reply
//! correlation pattern used for uplink commands elsewhere in this codebase,
//! adapted here to an unbounded per-id channel since a request may yield
//! many frames (chunked list responses, a long-lived watch) rather than
//! exactly one reply.

use std::collections::HashMap;
use std::sync::Mutex;

use mqtti_protocol::Frame;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
pub struct PendingRegistry {
    inner: Mutex<HashMap<String, mpsc::UnboundedSender<Frame>>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in frames for `id`, returning the receiving end.
    pub fn register(&self, id: String) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().insert(id, tx);
        rx
    }

    /// Route `frame` to the sink registered for its id, if any. Frames for
    /// unknown ids (already removed, or never ours) are dropped.
    pub fn dispatch(&self, frame: Frame) {
        let sink = self.inner.lock().unwrap().get(&frame.id).cloned();
        match sink {
            Some(tx) => {
                let _ = tx.send(frame);
            }
            None => debug!(id = %frame.id, "no pending sink for frame, dropping"),
        }
    }

    pub fn remove(&self, id: &str) {
        self.inner.lock().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtti_protocol::{Gvr, Mode, RequestBody};

    fn frame(id: &str) -> Frame {
        Frame::new(id, Mode::List, &Gvr::new("", "v1", "secrets"), "sender", &RequestBody::default()).unwrap()
    }

    #[tokio::test]
    async fn dispatch_routes_by_id() {
        let registry = PendingRegistry::new();
        let mut rx = registry.register("req-1".to_owned());
        registry.dispatch(frame("req-1"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, "req-1");
    }

    #[test]
    fn dispatch_for_unknown_id_does_not_panic() {
        let registry = PendingRegistry::new();
        registry.dispatch(frame("nobody-registered"));
    }

    #[tokio::test]
    async fn remove_stops_further_delivery() {
        let registry = PendingRegistry::new();
        let mut rx = registry.register("req-1".to_owned());
        registry.remove("req-1");
        registry.dispatch(frame("req-1"));
        // Sender side was dropped by remove(); the channel closes instead
        // of delivering anything further.
        assert!(rx.recv().await.is_none());
    }
}
