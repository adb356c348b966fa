//! Trait abstractions over the two cluster-facing collaborators the core
//! protocol needs: the sender's local [`ResourceStore`] and the projection
//! handler's destination-cluster [`DynamicClient`].
//! Only the operations the core actually calls are specified; everything
//! else (credentials, TLS, client construction) is an external concern
//! wired up once at binary startup.

mod dynamic_client;
mod error;
mod kube_store;
mod memory;
mod resource_store;

pub use dynamic_client::DynamicClient;
pub use error::{ClientError, StoreError};
pub use kube_store::{KubeDynamicClient, KubeResourceStore};
pub use memory::{InMemoryDynamicClient, InMemoryStore};
pub use resource_store::{ResourceStore, WatchEvent};
