//! Deterministic identity rewriting: source object + cluster-label value ->
//! destination `(namespace, name)`, per the namespaced/cluster-scoped split.

use mqtti_protocol::Object;

use crate::error::ProjectionError;

/// Rewrite `source`'s identity for the destination cluster, given the value
/// of the configured cluster-identity label on `source`.
///
/// - Namespaced source: new name = `<source-namespace>.<source-name>`, new
///   namespace = `cluster_label_value`.
/// - Cluster-scoped source: new name = `<cluster_label_value>.<source-name>`,
///   namespace unchanged (`None`).
///
/// `resourceVersion`, `managedFields`, and `generation` are cleared; callers
/// update-path callers re-populate `resourceVersion`/`uid` from the existing
/// destination object before writing.
pub fn rewrite_identity(source: &Object, cluster: &str) -> Object {
    let mut dest = source.clone();
    dest.metadata.resource_version.clear();
    dest.metadata.managed_fields = None;
    dest.metadata.generation = 0;
    dest.metadata.uid.clear();

    match &source.metadata.namespace {
        Some(source_namespace) => {
            dest.metadata.name = format!("{source_namespace}.{}", source.metadata.name);
            dest.metadata.namespace = Some(cluster.to_owned());
        }
        None => {
            dest.metadata.name = format!("{cluster}.{}", source.metadata.name);
        }
    }
    dest
}

/// The destination cluster-identity label's value on `source`, or an error
/// if it is absent or empty (required to be non-empty on replicated
/// objects per the wire schema).
pub fn cluster_label_value(source: &Object, cluster_label_key: &str) -> Result<String, ProjectionError> {
    match source.metadata.labels.get(cluster_label_key) {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(ProjectionError::MissingClusterLabel { label: cluster_label_key.to_owned() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn namespaced(name: &str, ns: &str, cluster: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": name, "namespace": ns, "uid": "u-1", "resourceVersion": "5",
                "labels": {"mqtt-resource": "", "cluster": cluster},
            },
        }))
        .unwrap()
    }

    fn cluster_scoped(name: &str, cluster: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": name, "uid": "u-2", "resourceVersion": "1",
                "labels": {"mqtt-resource": "", "cluster": cluster},
            },
        }))
        .unwrap()
    }

    #[test]
    fn namespaced_rewrite_joins_namespace_and_name() {
        let src = namespaced("alpha", "default", "edge-1");
        let dest = rewrite_identity(&src, "edge-1");
        assert_eq!(dest.metadata.name, "default.alpha");
        assert_eq!(dest.metadata.namespace.as_deref(), Some("edge-1"));
        assert!(dest.metadata.resource_version.is_empty());
        assert!(dest.metadata.managed_fields.is_none());
        assert_eq!(dest.metadata.generation, 0);
    }

    #[test]
    fn cluster_scoped_rewrite_prefixes_name_and_keeps_no_namespace() {
        let src = cluster_scoped("alpha", "edge-1");
        let dest = rewrite_identity(&src, "edge-1");
        assert_eq!(dest.metadata.name, "edge-1.alpha");
        assert!(dest.metadata.namespace.is_none());
    }

    #[test]
    fn rewrite_is_a_pure_function_of_its_inputs() {
        let src = namespaced("alpha", "default", "edge-1");
        let a = rewrite_identity(&src, "edge-1");
        let b = rewrite_identity(&src, "edge-1");
        assert_eq!(a.metadata.name, b.metadata.name);
        assert_eq!(a.metadata.namespace, b.metadata.namespace);
    }

    #[test]
    fn missing_cluster_label_is_an_error() {
        let src = cluster_scoped("alpha", "edge-1");
        let err = cluster_label_value(&src, "missing-label").unwrap_err();
        assert!(matches!(err, ProjectionError::MissingClusterLabel { .. }));
    }
}
