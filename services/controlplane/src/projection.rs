//! The projection handler: consumes one informer's events and applies them
//! to a second cluster via a [`DynamicClient`], rewriting identity and
//! bootstrapping destination namespaces along the way.

use std::sync::Arc;

use mqtti_informer::EventHandlers;
use mqtti_protocol::{Gvr, Object};
use mqtti_store::DynamicClient;
use tracing::{debug, info, warn};

use crate::error::ProjectionError;
use crate::identity::{cluster_label_value, rewrite_identity};

/// Consumes events from one informer and reconciles them into a second
/// cluster. Each event is applied independently; failures are logged and
/// left for the next resync to re-converge, per the error policy.
pub struct ProjectionHandler {
    gvr: Gvr,
    client: Arc<dyn DynamicClient>,
    cluster_label_key: String,
}

impl ProjectionHandler {
    pub fn new(gvr: Gvr, client: Arc<dyn DynamicClient>, cluster_label_key: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { gvr, client, cluster_label_key: cluster_label_key.into() })
    }

    /// Build the [`EventHandlers`] set to register on the source informer.
    /// Each callback spawns its own task so the informer's state-machine
    /// task is never blocked on a destination-cluster round trip.
    pub fn event_handlers(self: &Arc<Self>) -> EventHandlers {
        let on_add = self.clone();
        let on_update = self.clone();
        let on_delete = self.clone();
        EventHandlers::new()
            .with_add(move |obj: &Object| {
                let this = on_add.clone();
                let obj = obj.clone();
                tokio::spawn(async move { this.handle_add(&obj).await });
            })
            .with_update(move |_old: &Object, new: &Object| {
                let this = on_update.clone();
                let new = new.clone();
                tokio::spawn(async move { this.handle_update(&new).await });
            })
            .with_delete(move |obj: &Object| {
                let this = on_delete.clone();
                let obj = obj.clone();
                tokio::spawn(async move { this.handle_delete(&obj).await });
            })
    }

    async fn handle_add(&self, source: &Object) {
        if !source.metadata.is_replication_candidate() {
            debug!(name = %source.metadata.name, "dropping unlabeled object, not a replication candidate");
            return;
        }
        if let Err(e) = self.apply_create(source).await {
            warn!(name = %source.metadata.name, error = %e, "projection create failed, next resync will re-converge");
        }
    }

    /// Gates only on the *new* object's label, per the preserved "move-in,
    /// not move-out" asymmetry (see DESIGN.md).
    async fn handle_update(&self, new: &Object) {
        if !new.metadata.is_replication_candidate() {
            debug!(name = %new.metadata.name, "updated object no longer labeled, leaving destination in place");
            return;
        }
        if let Err(e) = self.apply_update(new).await {
            warn!(name = %new.metadata.name, error = %e, "projection update failed, next resync will re-converge");
        }
    }

    async fn handle_delete(&self, source: &Object) {
        if !source.metadata.is_replication_candidate() {
            return;
        }
        if let Err(e) = self.apply_delete(source).await {
            warn!(name = %source.metadata.name, error = %e, "projection delete failed, next resync will re-converge");
        }
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ProjectionError> {
        if self.client.get_namespace(namespace).await? {
            return Ok(());
        }
        // Proceed even if this races against a concurrent creator; the
        // client treats "already exists" as success.
        self.client.create_namespace(namespace).await?;
        Ok(())
    }

    async fn apply_create(&self, source: &Object) -> Result<(), ProjectionError> {
        let cluster = cluster_label_value(source, &self.cluster_label_key)?;
        let rewritten = rewrite_identity(source, &cluster);
        let Some(namespace) = rewritten.metadata.namespace.clone() else {
            self.client.create(&self.gvr, "", rewritten).await?;
            return Ok(());
        };
        self.ensure_namespace(&namespace).await?;
        self.client.create(&self.gvr, &namespace, rewritten).await?;
        info!(source = %source.metadata.name, namespace = %namespace, "projected object created");
        Ok(())
    }

    async fn apply_update(&self, source: &Object) -> Result<(), ProjectionError> {
        let cluster = cluster_label_value(source, &self.cluster_label_key)?;
        let mut rewritten = rewrite_identity(source, &cluster);
        let namespace = rewritten.metadata.namespace.clone().unwrap_or_default();

        match self.client.get(&self.gvr, &namespace, &rewritten.metadata.name).await? {
            Some(current) => {
                rewritten.metadata.resource_version = current.metadata.resource_version;
                rewritten.metadata.uid = current.metadata.uid;
                self.client.update(&self.gvr, &namespace, rewritten).await?;
            }
            // The destination object is gone (raced with a prior delete);
            // fall back to create.
            None => {
                if !namespace.is_empty() {
                    self.ensure_namespace(&namespace).await?;
                }
                self.client.create(&self.gvr, &namespace, rewritten).await?;
            }
        }
        Ok(())
    }

    async fn apply_delete(&self, source: &Object) -> Result<(), ProjectionError> {
        let cluster = cluster_label_value(source, &self.cluster_label_key)?;
        let rewritten = rewrite_identity(source, &cluster);
        let namespace = rewritten.metadata.namespace.unwrap_or_default();
        // "Not found" is success; a subsequent delete for the same object
        // is a no-op.
        self.client.delete(&self.gvr, &namespace, &rewritten.metadata.name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtti_store::InMemoryDynamicClient;
    use serde_json::json;

    fn labeled(name: &str, ns: &str, cluster: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": name, "namespace": ns, "uid": "src-uid", "resourceVersion": "1",
                "labels": {"mqtt-resource": "", "cluster": cluster},
            },
        }))
        .unwrap()
    }

    fn unlabeled(name: &str, ns: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": ns, "uid": "u", "resourceVersion": "1"},
        }))
        .unwrap()
    }

    fn gvr() -> Gvr {
        Gvr::new("", "v1", "secrets")
    }

    #[tokio::test]
    async fn create_bootstraps_namespace_and_rewrites_identity() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_add(&labeled("alpha", "default", "edge-1")).await;

        assert!(client.get_namespace("edge-1").await.unwrap());
        let dest = client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().unwrap();
        assert_eq!(dest.metadata.name, "default.alpha");
        assert!(dest.metadata.resource_version.is_empty());
    }

    #[tokio::test]
    async fn unlabeled_object_is_dropped_before_touching_destination() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_add(&unlabeled("alpha", "default")).await;

        assert!(client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_preserves_destination_resource_version_and_uid() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_add(&labeled("alpha", "default", "edge-1")).await;
        let created = client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().unwrap();

        let mut updated_source = labeled("alpha", "default", "edge-1");
        updated_source.data.insert("k".to_owned(), json!("new-value"));
        handler.handle_update(&updated_source).await;

        let dest = client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().unwrap();
        assert_eq!(dest.metadata.uid, created.metadata.uid);
        assert_eq!(dest.data.get("k").unwrap(), "new-value");
    }

    #[tokio::test]
    async fn update_falls_back_to_create_when_destination_missing() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_update(&labeled("alpha", "default", "edge-1")).await;

        assert!(client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_then_redelete_is_idempotent() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_add(&labeled("alpha", "default", "edge-1")).await;
        handler.handle_delete(&labeled("alpha", "default", "edge-1")).await;
        assert!(client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().is_none());

        // Second delete for the same object is a no-op, not an error.
        handler.handle_delete(&labeled("alpha", "default", "edge-1")).await;
    }

    #[tokio::test]
    async fn update_that_loses_the_label_leaves_destination_untouched() {
        let client: Arc<dyn DynamicClient> = Arc::new(InMemoryDynamicClient::new());
        let handler = ProjectionHandler::new(gvr(), client.clone(), "cluster");
        handler.handle_add(&labeled("alpha", "default", "edge-1")).await;

        handler.handle_update(&unlabeled("alpha", "default")).await;

        // Destination still has the object from the original create; the
        // "move-in, not move-out" asymmetry means this update is skipped
        // entirely, not deleted.
        assert!(client.get(&gvr(), "edge-1", "default.alpha").await.unwrap().is_some());
    }
}
