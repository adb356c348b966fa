//! In-memory fakes for tests and for the `--store memory` / `--sink memory`
//! binary modes. Uses the same `Arc<RwLock<HashMap<K, V>>>` shape with
//! small entry-level helper methods used elsewhere in this codebase.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mqtti_protocol::{Gvr, ListOptions, Object, WatchEventType};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{ClientError, StoreError};
use crate::resource_store::{ResourceStore, WatchEvent};
use crate::DynamicClient;

type ObjectKey = (Option<String>, String);

#[derive(Default)]
struct Kind {
    objects: HashMap<ObjectKey, Object>,
    watch_tx: Option<broadcast::Sender<WatchEvent>>,
}

/// An in-memory [`ResourceStore`]. Seed it with [`InMemoryStore::seed`] and
/// drive watch events with [`InMemoryStore::apply`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    kinds: Arc<RwLock<HashMap<Gvr, Kind>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the backing objects for `gvr` (does not emit watch events).
    pub fn seed(&self, gvr: &Gvr, objects: Vec<Object>) {
        let mut kinds = self.kinds.write().unwrap();
        let kind = kinds.entry(gvr.clone()).or_default();
        kind.objects = objects.into_iter().map(|o| (o.key(), o)).collect();
    }

    /// Apply a mutation and broadcast it to any open watch streams for
    /// `gvr`, mirroring how the upstream cluster's own event stream would
    /// drive a real sender.
    pub fn apply(&self, gvr: &Gvr, event_type: WatchEventType, object: Object) {
        let mut kinds = self.kinds.write().unwrap();
        let kind = kinds.entry(gvr.clone()).or_default();
        match event_type {
            WatchEventType::Deleted => {
                kind.objects.remove(&object.key());
            }
            _ => {
                kind.objects.insert(object.key(), object.clone());
            }
        }
        if let Some(tx) = &kind.watch_tx {
            let _ = tx.send(WatchEvent { event_type, object });
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        _opts: &ListOptions,
    ) -> Result<Vec<Object>, StoreError> {
        let kinds = self.kinds.read().unwrap();
        let Some(kind) = kinds.get(gvr) else {
            return Ok(vec![]);
        };
        Ok(kind
            .objects
            .values()
            .filter(|o| namespace.is_none() || o.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn watch(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        _opts: &ListOptions,
    ) -> Result<BoxStream<'static, WatchEvent>, StoreError> {
        let mut kinds = self.kinds.write().unwrap();
        let kind = kinds.entry(gvr.clone()).or_default();
        let tx = kind
            .watch_tx
            .get_or_insert_with(|| broadcast::channel(256).0)
            .clone();
        let namespace = namespace.map(ToOwned::to_owned);
        let stream = BroadcastStream::new(tx.subscribe())
            .filter_map(|res| async move { res.ok() })
            .filter(move |event| {
                let keep = namespace.is_none()
                    || event.object.metadata.namespace.as_deref() == namespace.as_deref();
                async move { keep }
            });
        Ok(Box::pin(stream))
    }
}

/// An in-memory [`DynamicClient`]. Namespaces are tracked explicitly so
/// `get_namespace`/`create_namespace` behave like a real cluster.
#[derive(Clone, Default)]
pub struct InMemoryDynamicClient {
    namespaces: Arc<RwLock<std::collections::HashSet<String>>>,
    objects: Arc<RwLock<HashMap<Gvr, HashMap<ObjectKey, Object>>>>,
}

impl InMemoryDynamicClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.read().unwrap().contains(name)
    }

    pub fn get_object(&self, gvr: &Gvr, namespace: &str, name: &str) -> Option<Object> {
        self.objects
            .read()
            .unwrap()
            .get(gvr)?
            .get(&(Some(namespace.to_owned()), name.to_owned()))
            .cloned()
    }
}

#[async_trait]
impl DynamicClient for InMemoryDynamicClient {
    async fn get_namespace(&self, name: &str) -> Result<bool, ClientError> {
        Ok(self.namespace_exists(name))
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClientError> {
        self.namespaces.write().unwrap().insert(name.to_owned());
        Ok(())
    }

    async fn get(
        &self,
        gvr: &Gvr,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Object>, ClientError> {
        Ok(self.get_object(gvr, namespace, name))
    }

    async fn create(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError> {
        let mut objects = self.objects.write().unwrap();
        let kind = objects.entry(gvr.clone()).or_default();
        kind.insert((Some(namespace.to_owned()), object.metadata.name.clone()), object);
        Ok(())
    }

    async fn update(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError> {
        let mut objects = self.objects.write().unwrap();
        let kind = objects.entry(gvr.clone()).or_default();
        let key = (Some(namespace.to_owned()), object.metadata.name.clone());
        if !kind.contains_key(&key) {
            return Err(ClientError::Update("object not found".to_owned()));
        }
        kind.insert(key, object);
        Ok(())
    }

    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ClientError> {
        let mut objects = self.objects.write().unwrap();
        if let Some(kind) = objects.get_mut(gvr) {
            kind.remove(&(Some(namespace.to_owned()), name.to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(name: &str, ns: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": ns, "uid": "u", "resourceVersion": "1"},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn list_filters_by_namespace() {
        let store = InMemoryStore::new();
        let gvr = Gvr::new("", "v1", "secrets");
        store.seed(&gvr, vec![sample("a", "default"), sample("b", "other")]);
        let objs = store.list(&gvr, Some("default"), &ListOptions::default()).await.unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].metadata.name, "a");
    }

    #[tokio::test]
    async fn watch_emits_applied_events() {
        let store = InMemoryStore::new();
        let gvr = Gvr::new("", "v1", "secrets");
        let mut stream = store.watch(&gvr, None, &ListOptions::default()).await.unwrap();
        store.apply(&gvr, WatchEventType::Added, sample("a", "default"));
        let event = stream.next().await.unwrap();
        assert_eq!(event.event_type, WatchEventType::Added);
        assert_eq!(event.object.metadata.name, "a");
    }

    #[tokio::test]
    async fn dynamic_client_create_namespace_is_idempotent() {
        let client = InMemoryDynamicClient::new();
        client.create_namespace("edge-1").await.unwrap();
        client.create_namespace("edge-1").await.unwrap();
        assert!(client.get_namespace("edge-1").await.unwrap());
    }

    #[tokio::test]
    async fn dynamic_client_delete_missing_is_ok() {
        let client = InMemoryDynamicClient::new();
        let gvr = Gvr::new("", "v1", "secrets");
        client.delete(&gvr, "edge-1", "missing").await.unwrap();
    }
}
