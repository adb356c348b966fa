//! `ResourceStore`: the narrow interface the sender needs against the local
//! authoritative cluster. Credential loading, TLS, and cluster
//! client construction remain an external collaborator concern;
//! only `list` and `watch` are specified here.

use async_trait::async_trait;
use futures::stream::BoxStream;
use mqtti_protocol::{Gvr, ListOptions, Object, WatchEventType};

use crate::error::StoreError;

/// One event from a `ResourceStore::watch` stream, mirroring the upstream
/// watch semantics the sender republishes verbatim.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub object: Object,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List objects of `gvr` in `namespace` (`None` = all namespaces)
    /// matching `opts`.
    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        opts: &ListOptions,
    ) -> Result<Vec<Object>, StoreError>;

    /// Open a change stream for `gvr` in `namespace`, starting from
    /// `opts.resource_version` when given.
    async fn watch(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        opts: &ListOptions,
    ) -> Result<BoxStream<'static, WatchEvent>, StoreError>;
}
