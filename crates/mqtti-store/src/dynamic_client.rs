//! `DynamicClient`: the narrow interface the projection handler needs
//! against the destination cluster. As with `ResourceStore`,
//! only the operations the control plane actually calls are specified —
//! the real client's transport/auth internals are external collaborators.

use async_trait::async_trait;
use mqtti_protocol::{Gvr, Object};

use crate::error::ClientError;

#[async_trait]
pub trait DynamicClient: Send + Sync {
    /// `true` if the namespace exists.
    async fn get_namespace(&self, name: &str) -> Result<bool, ClientError>;

    /// Create the namespace. Treats "already exists" as success: proceed
    /// even if creation races against a concurrent creator.
    async fn create_namespace(&self, name: &str) -> Result<(), ClientError>;

    async fn get(
        &self,
        gvr: &Gvr,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Object>, ClientError>;

    async fn create(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError>;

    async fn update(&self, gvr: &Gvr, namespace: &str, object: Object) -> Result<(), ClientError>;

    /// Delete by name. Treats "not found" as success.
    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ClientError>;
}
