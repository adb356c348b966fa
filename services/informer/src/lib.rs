//! The consumer side: per-kind local caches driven by list/watch traffic
//! tunneled over the broker.

mod backoff;
mod cache;
mod error;
mod factory;
mod handler;
mod informer;
mod pending;

pub use cache::Delta;
pub use error::InformerError;
pub use factory::SharedInformerFactory;
pub use handler::{AddHandler, DeleteHandler, EventHandlers, UpdateHandler};
pub use informer::{GenericInformer, InformerConfig};
