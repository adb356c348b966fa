//! The sender side: owns a local [`mqtti_store::ResourceStore`] and answers
//! `list`/`watch`/`stopwatch` requests arriving on the signal topic.

mod registry;
mod sender;

pub use registry::ActiveWatchRegistry;
pub use sender::Sender;
