//! `SharedInformerFactory`: owns every `GenericInformer` for one transport
//! session. Informers hold only the transport session and their config,
//! never a back-pointer to the factory.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use mqtti_protocol::{Frame, Gvr};
use mqtti_transport::TransportSession;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::informer::{GenericInformer, InformerConfig};
use crate::pending::PendingRegistry;

pub struct SharedInformerFactory {
    transport: Arc<TransportSession>,
    pending: Arc<PendingRegistry>,
    source: String,
    shutdown: CancellationToken,
    informers: Mutex<HashMap<Gvr, Arc<GenericInformer>>>,
    started: Mutex<HashSet<Gvr>>,
}

impl SharedInformerFactory {
    /// Subscribes to the session's payload topic once, routing every
    /// decoded frame into the shared pending-request registry by id. The
    /// `id` is a routing key into per-request sinks; never a global queue
    /// scan.
    pub async fn new(
        transport: Arc<TransportSession>,
        source: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Result<Arc<Self>, mqtti_transport::TransportError> {
        let pending = Arc::new(PendingRegistry::new());
        let dispatch_pending = pending.clone();
        let payload_topic = transport.payload_topic().to_owned();
        transport
            .subscribe(
                &payload_topic,
                Arc::new(move |frame: Frame| dispatch_pending.dispatch(frame)),
            )
            .await?;

        Ok(Arc::new(Self {
            transport,
            pending,
            source: source.into(),
            shutdown,
            informers: Mutex::new(HashMap::new()),
            started: Mutex::new(HashSet::new()),
        }))
    }

    /// Idempotent, memoized: repeated calls with the same `gvr` return the
    /// same informer instance.
    pub fn for_resource(&self, gvr: Gvr, config: InformerConfig) -> Arc<GenericInformer> {
        self.informers
            .lock()
            .unwrap()
            .entry(gvr.clone())
            .or_insert_with(|| {
                GenericInformer::new(
                    gvr,
                    config,
                    self.transport.clone(),
                    self.pending.clone(),
                    self.source.clone(),
                    self.shutdown.clone(),
                )
            })
            .clone()
    }

    /// Starts every constructed informer's run loop exactly once. Safe to
    /// call multiple times; only newly constructed informers are started
    /// on a repeat call.
    pub fn start(self: &Arc<Self>) {
        let informers: Vec<Arc<GenericInformer>> = {
            let mut started = self.started.lock().unwrap();
            self.informers
                .lock()
                .unwrap()
                .iter()
                .filter(|(gvr, _)| started.insert((*gvr).clone()))
                .map(|(_, informer)| informer.clone())
                .collect()
        };
        for informer in informers {
            let gvr = informer.gvr().clone();
            tokio::spawn(async move {
                if let Err(e) = informer.run().await {
                    debug!(%gvr, error = %e, "informer loop exited");
                }
            });
        }
    }

    /// Blocks until every started informer has completed its initial list,
    /// or until `stop` fires. Informers that were never started are not
    /// waited on.
    pub async fn wait_for_cache_sync(&self, stop: &CancellationToken) -> HashMap<Gvr, bool> {
        let informers: Vec<Arc<GenericInformer>> = {
            let started = self.started.lock().unwrap();
            self.informers
                .lock()
                .unwrap()
                .iter()
                .filter(|(gvr, _)| started.contains(*gvr))
                .map(|(_, informer)| informer.clone())
                .collect()
        };
        let mut result = HashMap::new();
        for informer in informers {
            let synced = informer.wait_synced(stop).await;
            result.insert(informer.gvr().clone(), synced);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_resource_is_memoized_by_gvr() {
        // Constructing a real TransportSession requires a broker; this
        // covers the HashMap memoization logic directly instead.
        let mut map: HashMap<Gvr, u32> = HashMap::new();
        let gvr = Gvr::new("", "v1", "secrets");
        map.entry(gvr.clone()).or_insert(1);
        map.entry(gvr.clone()).or_insert(2);
        assert_eq!(map.get(&gvr), Some(&1));
    }
}
