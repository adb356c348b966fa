//! The sender: subscribes to the signal topic, dispatches each inbound
//! frame to list/watch/stopwatch handling against a local [`ResourceStore`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use mqtti_protocol::{
    Frame, Gvr, ListResponseBody, Mode, RequestBody, WatchEventType, WatchResponseBody,
};
use mqtti_store::{ResourceStore, WatchEvent};
use mqtti_transport::TransportSession;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::ActiveWatchRegistry;

/// Objects per `list_response` frame before rolling over to a new chunk.
const CHUNK_SIZE: usize = 500;

/// How long a single watch-response publish may take before the sender
/// gives up on a slow/stuck consumer and drops the watch rather than
/// blocking indefinitely.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the bounded queue between a watch's store-stream consumer
/// and its broker publisher.
const WATCH_QUEUE_CAPACITY: usize = 256;

pub struct Sender {
    transport: Arc<TransportSession>,
    store: Arc<dyn ResourceStore>,
    registry: Arc<ActiveWatchRegistry>,
    source: String,
}

impl Sender {
    pub fn new(transport: Arc<TransportSession>, store: Arc<dyn ResourceStore>, source: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            registry: Arc::new(ActiveWatchRegistry::new()),
            source: source.into(),
        })
    }

    /// Subscribe to the signal topic and block until `shutdown` fires.
    /// Each inbound frame is handled in a task distinct from the broker's
    /// delivery callback.
    pub async fn run(self: Arc<Self>, shutdown: tokio_util::sync::CancellationToken) -> Result<(), mqtti_transport::TransportError> {
        let this = self.clone();
        let signal_topic = self.transport.signal_topic().to_owned();
        self.transport
            .subscribe(
                &signal_topic,
                Arc::new(move |frame: Frame| {
                    let this = this.clone();
                    tokio::spawn(async move {
                        this.handle_frame(frame).await;
                    });
                }),
            )
            .await?;

        shutdown.cancelled().await;
        info!("sender shutting down, cancelling all active watches");
        self.registry.cancel_all();
        Ok(())
    }

    async fn handle_frame(self: Arc<Self>, frame: Frame) {
        let (mode, gvr) = match frame.mode_and_gvr() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, id = %frame.id, "dropping frame with malformed type");
                return;
            }
        };

        match mode {
            Mode::List => {
                let body: RequestBody = match frame.body() {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, id = %frame.id, "dropping malformed list request");
                        return;
                    }
                };
                self.handle_list(frame.id, gvr, body).await;
            }
            Mode::Watch => {
                let body: RequestBody = match frame.body() {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, id = %frame.id, "dropping malformed watch request");
                        return;
                    }
                };
                self.clone().handle_watch(frame.id, gvr, body);
            }
            Mode::StopWatch => {
                debug!(id = %frame.id, "stopwatch received");
                self.registry.stop(&frame.id);
            }
            Mode::ListResponse | Mode::WatchResponse => {
                debug!(id = %frame.id, "ignoring response-mode frame on signal topic");
            }
        }
    }

    async fn handle_list(&self, id: String, gvr: Gvr, body: RequestBody) {
        let objects = match self
            .store
            .list(&gvr, body.namespace.as_deref(), &body.options)
            .await
        {
            Ok(objects) => objects,
            Err(e) => {
                // No error list-response frame exists on the wire; rely on
                // the informer's relist-on-timeout policy.
                warn!(error = %e, id = %id, gvr = %gvr, "list failed, informer will time out and retry");
                return;
            }
        };

        let mut chunks = objects.chunks(CHUNK_SIZE).peekable();
        if chunks.peek().is_none() {
            self.publish_list_chunk(&id, &gvr, ListResponseBody { objects: vec![], end_of_list: true }).await;
            return;
        }
        while let Some(chunk) = chunks.next() {
            let end_of_list = chunks.peek().is_none();
            let body = ListResponseBody { objects: chunk.to_vec(), end_of_list };
            self.publish_list_chunk(&id, &gvr, body).await;
        }
    }

    async fn publish_list_chunk(&self, id: &str, gvr: &Gvr, body: ListResponseBody) {
        let end_of_list = body.end_of_list;
        match Frame::new(id, Mode::ListResponse, gvr, self.source.as_str(), &body) {
            Ok(frame) => {
                if let Err(e) = self.transport.publish(self.transport.payload_topic(), &frame).await {
                    warn!(error = %e, id = %id, "failed to publish list response");
                }
            }
            Err(e) => warn!(error = %e, id = %id, "failed to encode list response"),
        }
        if end_of_list {
            info!(id = %id, gvr = %gvr, "list response complete");
        }
    }

    fn handle_watch(self: Arc<Self>, id: String, gvr: Gvr, body: RequestBody) {
        let token = self.registry.insert(id.clone());
        tokio::spawn(async move {
            let stream = match self.store.watch(&gvr, body.namespace.as_deref(), &body.options).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, id = %id, gvr = %gvr, "watch open failed");
                    self.publish_watch_error(&id, &gvr, e.to_string()).await;
                    self.registry.remove(&id);
                    return;
                }
            };

            let (tx, rx) = mpsc::channel::<WatchEvent>(WATCH_QUEUE_CAPACITY);
            let producer_token = token.clone();
            let producer_id = id.clone();
            let producer = async move {
                let mut stream = stream;
                loop {
                    tokio::select! {
                        _ = producer_token.cancelled() => break,
                        event = stream.next() => match event {
                            Some(event) => {
                                if tx.try_send(event).is_err() {
                                    warn!(id = %producer_id, "watch publish queue full, dropping watch");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            };

            let consumer_id = id.clone();
            let consumer_gvr = gvr.clone();
            let this = self.clone();
            let consumer = async move {
                this.drain_watch_queue(consumer_id, consumer_gvr, rx).await;
            };

            let stopped_explicitly = tokio::select! {
                _ = token.cancelled() => true,
                _ = producer => false,
                _ = consumer => false,
            };

            if !stopped_explicitly {
                self.publish_watch_error(&id, &gvr, "watch terminated".to_owned()).await;
            }
            self.registry.remove(&id);
        });
    }

    async fn drain_watch_queue(&self, id: String, gvr: Gvr, mut rx: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = rx.recv().await {
            let body = WatchResponseBody { event_type: event.event_type, object: event.object };
            match Frame::new(id.as_str(), Mode::WatchResponse, &gvr, self.source.as_str(), &body) {
                Ok(frame) => {
                    let publish = self.transport.publish(self.transport.payload_topic(), &frame);
                    match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, id = %id, "failed to publish watch response"),
                        Err(_) => {
                            warn!(id = %id, "publish timed out, dropping watch");
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, id = %id, "failed to encode watch response"),
            }
        }
    }

    async fn publish_watch_error(&self, id: &str, gvr: &Gvr, message: String) {
        let body = WatchResponseBody {
            event_type: WatchEventType::Error,
            object: error_placeholder_object(gvr, &message),
        };
        if let Ok(frame) = Frame::new(id, Mode::WatchResponse, gvr, self.source.as_str(), &body) {
            let _ = self.transport.publish(self.transport.payload_topic(), &frame).await;
        }
    }
}

/// A minimal object carrying the failure message, since the watch-response
/// schema requires an `object` field even on `error` events.
fn error_placeholder_object(gvr: &Gvr, message: &str) -> mqtti_protocol::Object {
    let mut data = serde_json::Map::new();
    data.insert("message".to_owned(), serde_json::Value::String(message.to_owned()));
    mqtti_protocol::Object {
        api_version: gvr.api_version(),
        kind: String::new(),
        metadata: mqtti_protocol::ObjectMeta::default(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtti_protocol::ListOptions;
    use mqtti_store::InMemoryStore;

    #[test]
    fn chunk_size_keeps_list_responses_well_under_broker_message_limits() {
        assert!(CHUNK_SIZE > 0 && CHUNK_SIZE <= 500);
    }

    #[tokio::test]
    async fn list_on_empty_store_yields_no_objects() {
        let store = InMemoryStore::new();
        let gvr = Gvr::new("", "v1", "secrets");
        let objects = store.list(&gvr, None, &ListOptions::default()).await.unwrap();
        assert!(objects.is_empty());
    }
}
