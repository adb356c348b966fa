//! Real-cluster implementations of [`ResourceStore`] and [`DynamicClient`]
//! backed by `kube`'s dynamic (unstructured) client, grounded in the
//! `kube-rs` examples' `Api<K>` / dynamic-object idiom. Credential loading
//! and `kube::Client` construction happen once at binary startup and are
//! threaded in here as an external collaborator.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{DeleteParams, ListParams, PostParams, WatchEvent as KubeWatchEvent, WatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, ObjectMeta as KubeObjectMeta};
use kube::{Api, Client};
use mqtti_protocol::{Gvr, ListOptions, Object, ObjectMeta, WatchEventType};
use tracing::warn;

use crate::dynamic_client::DynamicClient;
use crate::error::{ClientError, StoreError};
use crate::resource_store::{ResourceStore, WatchEvent};

fn api_resource_for(gvr: &Gvr) -> ApiResource {
    let gvk = GroupVersionKind {
        group: gvr.group.clone(),
        version: gvr.version.clone(),
        kind: String::new(),
    };
    ApiResource::from_gvk_with_plural(&gvk, &gvr.resource)
}

fn list_params(opts: &ListOptions) -> ListParams {
    let mut lp = ListParams::default();
    if let Some(sel) = &opts.label_selector {
        lp = lp.labels(sel);
    }
    if let Some(sel) = &opts.field_selector {
        lp = lp.fields(sel);
    }
    if let Some(limit) = opts.limit {
        lp = lp.limit(limit.max(0) as u32);
    }
    if let Some(timeout) = opts.timeout_seconds {
        lp = lp.timeout(timeout.min(u64::from(u32::MAX)) as u32);
    }
    if let Some(cont) = &opts.continue_token {
        lp.continue_token = Some(cont.clone());
    }
    lp
}

fn watch_params(opts: &ListOptions) -> WatchParams {
    let mut wp = WatchParams::default();
    if let Some(sel) = &opts.label_selector {
        wp = wp.labels(sel);
    }
    if let Some(sel) = &opts.field_selector {
        wp = wp.fields(sel);
    }
    if let Some(timeout) = opts.timeout_seconds {
        wp = wp.timeout(timeout.min(u64::from(u32::MAX)) as u32);
    }
    wp
}

fn to_protocol_object(gvr: &Gvr, obj: DynamicObject) -> Object {
    let api_version = obj
        .types
        .as_ref()
        .map(|t| t.api_version.clone())
        .unwrap_or_else(|| gvr.api_version());
    let kind = obj.types.map(|t| t.kind).unwrap_or_default();
    let metadata = ObjectMeta {
        name: obj.metadata.name.unwrap_or_default(),
        namespace: obj.metadata.namespace,
        uid: obj.metadata.uid.unwrap_or_default(),
        resource_version: obj.metadata.resource_version.unwrap_or_default(),
        labels: obj.metadata.labels.unwrap_or_default().into_iter().collect(),
        annotations: obj.metadata.annotations.unwrap_or_default().into_iter().collect(),
        generation: obj.metadata.generation.unwrap_or_default(),
        managed_fields: None,
    };
    let data = match obj.data {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Object { api_version, kind, metadata, data }
}

fn from_protocol_object(gvr: &Gvr, object: &Object) -> DynamicObject {
    let mut dyn_obj = DynamicObject::new(&object.metadata.name, &api_resource_for(gvr));
    dyn_obj.metadata = KubeObjectMeta {
        name: Some(object.metadata.name.clone()),
        namespace: object.metadata.namespace.clone(),
        uid: (!object.metadata.uid.is_empty()).then(|| object.metadata.uid.clone()),
        resource_version: (!object.metadata.resource_version.is_empty())
            .then(|| object.metadata.resource_version.clone()),
        labels: Some(object.metadata.labels.clone().into_iter().collect()),
        annotations: Some(object.metadata.annotations.clone().into_iter().collect()),
        generation: Some(object.metadata.generation),
        ..Default::default()
    };
    dyn_obj.data = serde_json::Value::Object(object.data.clone());
    dyn_obj
}

fn kube_watch_event(gvr: &Gvr, event: KubeWatchEvent<DynamicObject>) -> Option<WatchEvent> {
    let (event_type, obj) = match event {
        KubeWatchEvent::Added(o) => (WatchEventType::Added, o),
        KubeWatchEvent::Modified(o) => (WatchEventType::Modified, o),
        KubeWatchEvent::Deleted(o) => (WatchEventType::Deleted, o),
        KubeWatchEvent::Bookmark(_) => return None,
        KubeWatchEvent::Error(e) => {
            warn!(error = %e.message, "resource store watch error");
            return None;
        }
    };
    Some(WatchEvent { event_type, object: to_protocol_object(gvr, obj) })
}

/// Lists and watches a dynamic (unstructured) resource kind against a real
/// cluster via `kube::Api<DynamicObject>`.
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvr: &Gvr, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource_for(gvr);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        opts: &ListOptions,
    ) -> Result<Vec<Object>, StoreError> {
        let api = self.api(gvr, namespace);
        let list = api
            .list(&list_params(opts))
            .await
            .map_err(|e| StoreError::List(e.to_string()))?;
        Ok(list.items.into_iter().map(|o| to_protocol_object(gvr, o)).collect())
    }

    async fn watch(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        opts: &ListOptions,
    ) -> Result<BoxStream<'static, WatchEvent>, StoreError> {
        let api = self.api(gvr, namespace);
        let version = opts.resource_version.clone().unwrap_or_default();
        let stream = api
            .watch(&watch_params(opts), &version)
            .await
            .map_err(|e| StoreError::Watch(e.to_string()))?;
        let gvr = gvr.clone();
        Ok(Box::pin(stream.filter_map(move |item| {
            let gvr = gvr.clone();
            async move {
                match item {
                    Ok(event) => kube_watch_event(&gvr, event),
                    Err(e) => {
                        warn!(error = %e, "resource store watch stream error");
                        None
                    }
                }
            }
        })))
    }
}

/// Applies create/update/delete against a real destination cluster via
/// `kube::Api<DynamicObject>` and bootstraps namespaces via
/// `kube::Api<Namespace>`.
pub struct KubeDynamicClient {
    client: Client,
}

impl KubeDynamicClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvr: &Gvr, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource_for(gvr))
    }
}

#[async_trait]
impl DynamicClient for KubeDynamicClient {
    async fn get_namespace(&self, name: &str) -> Result<bool, ClientError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces.get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(ClientError::Get(e.to_string())),
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClientError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: KubeObjectMeta {
                name: Some(name.to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        match namespaces.create(&PostParams::default(), &ns).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
            Err(e) => Err(ClientError::Create(e.to_string())),
        }
    }

    async fn get(
        &self,
        gvr: &Gvr,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Object>, ClientError> {
        match self.api(gvr, namespace).get(name).await {
            Ok(obj) => Ok(Some(to_protocol_object(gvr, obj))),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(ClientError::Get(e.to_string())),
        }
    }

    async fn create(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError> {
        let dyn_obj = from_protocol_object(gvr, &object);
        self.api(gvr, namespace)
            .create(&PostParams::default(), &dyn_obj)
            .await
            .map_err(|e| ClientError::Create(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError> {
        let dyn_obj = from_protocol_object(gvr, &object);
        self.api(gvr, namespace)
            .replace(&object.metadata.name, &PostParams::default(), &dyn_obj)
            .await
            .map_err(|e| ClientError::Update(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ClientError> {
        match self.api(gvr, namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(ClientError::Delete(e.to_string())),
        }
    }
}
