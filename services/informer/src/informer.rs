//! `GenericInformer`: one resource kind's list-then-watch state machine.
//! One task drives the whole lifecycle; the cache is mutated
//! only by that task; handlers run synchronously on it, in cache-
//! application order.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mqtti_protocol::{
    Frame, Gvr, ListOptions, ListResponseBody, Mode, Object, RequestBody, StopWatchBody,
    WatchEventType, WatchResponseBody,
};
use mqtti_transport::{TransportError, TransportSession};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::cache::{Cache, Delta};
use crate::handler::EventHandlers;
use crate::pending::PendingRegistry;

/// Per-kind settings threaded explicitly into each informer. No hidden
/// singletons.
#[derive(Debug, Clone)]
pub struct InformerConfig {
    pub namespace: Option<String>,
    pub list_options: ListOptions,
    pub resync_period: Duration,
    pub list_timeout: Duration,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            list_options: ListOptions::default(),
            resync_period: Duration::from_secs(5 * 60),
            list_timeout: Duration::from_secs(30),
        }
    }
}

enum ListError {
    Timeout,
    Closed,
    Transport(TransportError),
}

enum WatchOutcome {
    Relist,
    Shutdown,
}

pub struct GenericInformer {
    gvr: Gvr,
    config: InformerConfig,
    transport: Arc<TransportSession>,
    pending: Arc<PendingRegistry>,
    cache: Cache,
    handlers: Mutex<Vec<EventHandlers>>,
    source: String,
    synced_tx: watch::Sender<bool>,
    synced_rx: watch::Receiver<bool>,
    shutdown: CancellationToken,
}

impl GenericInformer {
    pub(crate) fn new(
        gvr: Gvr,
        config: InformerConfig,
        transport: Arc<TransportSession>,
        pending: Arc<PendingRegistry>,
        source: String,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (synced_tx, synced_rx) = watch::channel(false);
        Arc::new(Self {
            gvr,
            config,
            transport,
            pending,
            cache: Cache::new(),
            handlers: Mutex::new(Vec::new()),
            source,
            synced_tx,
            synced_rx,
            shutdown,
        })
    }

    pub fn gvr(&self) -> &Gvr {
        &self.gvr
    }

    /// Register a handler set. Multiple handler sets may be registered;
    /// all are invoked for every delta.
    pub fn add_event_handler(&self, handlers: EventHandlers) {
        self.handlers.lock().unwrap().push(handlers);
    }

    /// A read-only snapshot of the cache.
    pub fn get_store(&self) -> Vec<Object> {
        self.cache.snapshot()
    }

    /// A read-only snapshot of the cache restricted to one namespace,
    /// served from the cache's secondary namespace index.
    pub fn get_store_namespace(&self, namespace: &str) -> Vec<Object> {
        self.cache.snapshot_namespace(namespace)
    }

    pub(crate) async fn wait_synced(&self, stop: &CancellationToken) -> bool {
        let mut rx = self.synced_rx.clone();
        tokio::select! {
            _ = stop.cancelled() => false,
            result = rx.wait_for(|synced| *synced) => result.is_ok(),
        }
    }

    /// Drive the full `Disconnected -> Listing -> Watching -> Listing -> ...
    /// -> Stopped` lifecycle until `shutdown` fires.
    pub(crate) async fn run(self: Arc<Self>) -> Result<(), crate::error::InformerError> {
        loop {
            if self.shutdown.is_cancelled() {
                info!(gvr = %self.gvr, "informer stopped");
                return Err(crate::error::InformerError::Cancelled);
            }
            let Some((objects, resource_version)) = self.list_with_retry().await else {
                info!(gvr = %self.gvr, "informer stopped");
                return Err(crate::error::InformerError::Cancelled);
            };
            let deltas = self.cache.replace(objects);
            for delta in deltas {
                self.fire_delta(&delta);
            }
            let _ = self.synced_tx.send(true);

            match self.watch_until_relist(resource_version).await {
                WatchOutcome::Relist => continue,
                WatchOutcome::Shutdown => {
                    info!(gvr = %self.gvr, "informer stopped");
                    return Err(crate::error::InformerError::Cancelled);
                }
            }
        }
    }

    async fn list_with_retry(self: &Arc<Self>) -> Option<(Vec<Object>, String)> {
        let mut backoff = Backoff::new();
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            let id = generate_id();
            match self.do_list(&id).await {
                Ok(objects) => {
                    let resource_version = highest_resource_version(&objects);
                    return Some((objects, resource_version));
                }
                Err(ListError::Closed) => return None,
                Err(ListError::Timeout) => {
                    debug!(gvr = %self.gvr, id = %id, "list timed out, retrying with backoff");
                }
                Err(ListError::Transport(e)) => {
                    warn!(gvr = %self.gvr, error = %e, "list publish failed, retrying with backoff");
                }
            }
            let delay = backoff.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return None,
            }
        }
    }

    async fn do_list(&self, id: &str) -> Result<Vec<Object>, ListError> {
        let mut rx = self.pending.register(id.to_owned());
        let body = RequestBody {
            namespace: self.config.namespace.clone(),
            options: self.config.list_options.clone(),
        };
        if let Err(e) = self.publish_request(id, Mode::List, &body).await {
            self.pending.remove(id);
            return Err(ListError::Transport(e));
        }

        let mut objects = Vec::new();
        let outcome = loop {
            match tokio::time::timeout(self.config.list_timeout, rx.recv()).await {
                Ok(Some(frame)) => match frame.body::<ListResponseBody>() {
                    Ok(mut chunk) => {
                        objects.append(&mut chunk.objects);
                        if chunk.end_of_list {
                            break Ok(objects);
                        }
                    }
                    Err(e) => {
                        warn!(gvr = %self.gvr, id = %id, error = %e, "malformed list-response frame");
                        break Err(ListError::Timeout);
                    }
                },
                Ok(None) => break Err(ListError::Closed),
                Err(_elapsed) => break Err(ListError::Timeout),
            }
        };
        self.pending.remove(id);
        outcome
    }

    async fn watch_until_relist(self: &Arc<Self>, resource_version: String) -> WatchOutcome {
        let id = generate_id();
        let mut rx = self.pending.register(id.clone());
        let body = RequestBody {
            namespace: self.config.namespace.clone(),
            options: ListOptions {
                resource_version: Some(resource_version),
                ..self.config.list_options.clone()
            },
        };
        if let Err(e) = self.publish_request(&id, Mode::Watch, &body).await {
            warn!(gvr = %self.gvr, error = %e, "watch publish failed, relisting");
            self.pending.remove(&id);
            return WatchOutcome::Relist;
        }

        let mut resync = tokio::time::interval(self.config.resync_period);
        resync.tick().await;
        let mut last_frame_at = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.publish_stopwatch(&id).await;
                    self.pending.remove(&id);
                    return WatchOutcome::Shutdown;
                }
                frame = rx.recv() => {
                    match frame {
                        None => {
                            self.pending.remove(&id);
                            return WatchOutcome::Relist;
                        }
                        Some(frame) => {
                            last_frame_at = Instant::now();
                            match frame.body::<WatchResponseBody>() {
                                Ok(body) => {
                                    if body.event_type == WatchEventType::Error {
                                        self.pending.remove(&id);
                                        return WatchOutcome::Relist;
                                    }
                                    self.apply_watch_event(body);
                                }
                                Err(e) => warn!(gvr = %self.gvr, id = %id, error = %e, "malformed watch-response frame"),
                            }
                        }
                    }
                }
                _ = resync.tick() => {
                    if last_frame_at.elapsed() > self.config.resync_period {
                        debug!(gvr = %self.gvr, id = %id, "no watch activity within resync period, relisting");
                        self.publish_stopwatch(&id).await;
                        self.pending.remove(&id);
                        return WatchOutcome::Relist;
                    }
                    self.fire_local_resync();
                }
            }
        }
    }

    fn apply_watch_event(&self, body: WatchResponseBody) {
        let delta = match body.event_type {
            WatchEventType::Added => Some(self.cache.apply_added(body.object)),
            WatchEventType::Modified => Some(self.cache.apply_modified(body.object)),
            WatchEventType::Deleted => self.cache.apply_deleted(&body.object),
            WatchEventType::Bookmark | WatchEventType::Error => None,
        };
        if let Some(delta) = delta {
            self.fire_delta(&delta);
        }
    }

    /// Timer-driven local re-fire: not a wire operation, just
    /// `update(old, old)` for every cached object.
    fn fire_local_resync(&self) {
        for object in self.cache.snapshot() {
            self.fire_delta(&Delta::Updated { old: object.clone(), new: object });
        }
    }

    fn fire_delta(&self, delta: &Delta) {
        let handlers = self.handlers.lock().unwrap().clone();
        for h in &handlers {
            match delta {
                Delta::Added(obj) => {
                    if let Some(f) = &h.on_add {
                        f(obj);
                    }
                }
                Delta::Updated { old, new } => {
                    if let Some(f) = &h.on_update {
                        f(old, new);
                    }
                }
                Delta::Deleted(obj) => {
                    if let Some(f) = &h.on_delete {
                        f(obj);
                    }
                }
            }
        }
    }

    async fn publish_request(&self, id: &str, mode: Mode, body: &RequestBody) -> Result<(), TransportError> {
        let frame = Frame::new(id, mode, &self.gvr, self.source.as_str(), body)?;
        self.transport.publish(self.transport.signal_topic(), &frame).await
    }

    async fn publish_stopwatch(&self, id: &str) {
        let Ok(frame) = Frame::new(id, Mode::StopWatch, &self.gvr, self.source.as_str(), &StopWatchBody::default()) else {
            return;
        };
        if let Err(e) = self.transport.publish(self.transport.signal_topic(), &frame).await {
            warn!(gvr = %self.gvr, id = %id, error = %e, "best-effort stopwatch publish failed");
        }
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The highest `resourceVersion` among `objects`, used as the watch
/// cursor for the subsequent `watch` request. Compared numerically when every version parses as an
/// integer (the common case for real clusters), falling back to a
/// lexicographic maximum otherwise.
fn highest_resource_version(objects: &[Object]) -> String {
    objects
        .iter()
        .map(|o| o.metadata.resource_version.clone())
        .max_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(rv: &str) -> Object {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "a", "namespace": "default", "uid": "u", "resourceVersion": rv},
        }))
        .unwrap()
    }

    #[test]
    fn highest_resource_version_compares_numerically() {
        let objects = vec![obj("2"), obj("10"), obj("3")];
        assert_eq!(highest_resource_version(&objects), "10");
    }

    #[test]
    fn highest_resource_version_of_empty_list_is_empty_string() {
        assert_eq!(highest_resource_version(&[]), "");
    }
}
