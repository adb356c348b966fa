//! The downstream reconciler: an application-level consumer of
//! [`mqtti_informer`] that rewrites object identity into a global namespace
//! and applies create/update/delete against a second cluster's generic
//! client.

mod error;
mod identity;
mod projection;

pub use error::ProjectionError;
pub use identity::{cluster_label_value, rewrite_identity};
pub use projection::ProjectionHandler;
