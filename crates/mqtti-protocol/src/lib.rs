//! Wire schema for the broker-tunneled list/watch protocol.
//!
//! Every message is a [`Frame`] whose `type` string is the sole dispatch
//! key: `<mode>.<group>.<version>.<resource>`. The inner `payload` schema is
//! determined by the mode (see [`RequestBody`], [`ListResponseBody`],
//! [`WatchResponseBody`]). This crate has no I/O; it only knows how to
//! encode and decode documents.

mod error;
mod frame;
mod gvr;
mod object;

pub use error::ProtocolError;
pub use frame::{
    Frame, ListOptions, ListResponseBody, RequestBody, StopWatchBody, WatchEventType,
    WatchResponseBody,
};
pub use gvr::{message_type, parse_message_type, Gvr, Mode};
pub use object::{Object, ObjectMeta, REPLICATION_MARKER_LABEL};
