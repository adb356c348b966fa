//! The opaque structured document carried as list/watch payloads.
//!
//! `metadata` is the one sub-record every kind exposes with a stable shape;
//! everything else (`spec`, `data`, `status`, …) stays an opaque
//! [`serde_json::Value`] so the informer and sender never need to know the
//! concrete kind beyond its [`crate::Gvr`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The replication-marker label: presence marks an object as a
/// projection candidate.
pub const REPLICATION_MARKER_LABEL: &str = "mqtt-resource";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub uid: String,
    #[serde(default, rename = "resourceVersion")]
    pub resource_version: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, rename = "managedFields", skip_serializing_if = "Option::is_none")]
    pub managed_fields: Option<serde_json::Value>,
}

impl ObjectMeta {
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    pub fn is_replication_candidate(&self) -> bool {
        self.has_label(REPLICATION_MARKER_LABEL)
    }
}

/// A self-describing object document: `apiVersion`, `kind`, `metadata`, and
/// every other field folded into `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    /// Everything outside `apiVersion`/`kind`/`metadata` (e.g. `data`, `spec`,
    /// `status`), kept opaque.
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Object {
    /// The `(namespace, name)` key used for cache identity and per-kind
    /// uniqueness.
    pub fn key(&self) -> (Option<String>, String) {
        (self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    pub fn is_namespaced(&self) -> bool {
        self.metadata.namespace.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json_preserving_opaque_fields() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": "alpha",
                "namespace": "default",
                "uid": "u-1",
                "resourceVersion": "42",
                "labels": {"mqtt-resource": "", "cluster": "edge-1"},
            },
            "type": "Opaque",
            "data": {"k": "v"},
        });
        let obj: Object = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(obj.metadata.name, "alpha");
        assert_eq!(obj.metadata.namespace.as_deref(), Some("default"));
        assert!(obj.metadata.is_replication_candidate());
        assert_eq!(obj.data.get("type").unwrap(), "Opaque");

        let back = serde_json::to_value(&obj).unwrap();
        assert_eq!(back["metadata"]["resourceVersion"], "42");
        assert_eq!(back["type"], "Opaque");
    }

    #[test]
    fn cluster_scoped_object_has_no_namespace() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "edge-1", "uid": "u-2", "resourceVersion": "1"},
        });
        let obj: Object = serde_json::from_value(raw).unwrap();
        assert!(!obj.is_namespaced());
        assert_eq!(obj.key(), (None, "edge-1".to_owned()));
    }
}
