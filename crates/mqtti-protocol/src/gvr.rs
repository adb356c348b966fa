//! Resource identifiers and the `<mode>.<group>.<version>.<resource>` wire
//! encoding used as the sole dispatch key on [`crate::Frame::type_`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A `(group, version, resource)` triple naming a kind of object in the
/// upstream resource store. `group` is empty for the core API group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// `apiVersion` for an object of this kind: `"<version>"` for the core
    /// group, `"<group>/<version>"` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group, self.version, self.resource)
    }
}

/// The operation mode carried in a frame's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    List,
    Watch,
    StopWatch,
    ListResponse,
    WatchResponse,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::List => "list",
            Mode::Watch => "watch",
            Mode::StopWatch => "stopwatch",
            Mode::ListResponse => "list_response",
            Mode::WatchResponse => "watch_response",
        }
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Mode::List),
            "watch" => Ok(Mode::Watch),
            "stopwatch" => Ok(Mode::StopWatch),
            "list_response" => Ok(Mode::ListResponse),
            "watch_response" => Ok(Mode::WatchResponse),
            other => Err(ProtocolError::UnknownMode(other.to_owned())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the `type` string for a frame: `<mode>.<group>.<version>.<resource>`.
pub fn message_type(mode: Mode, gvr: &Gvr) -> String {
    format!("{}.{}", mode, gvr)
}

/// Parse a frame's `type` string back into `(mode, gvr)`.
///
/// The type string is the sole dispatch key; everything after the
/// first `.` is the GVR's `group.version.resource`, split on the next two
/// dots. A malformed type yields [`ProtocolError::MalformedType`].
pub fn parse_message_type(type_: &str) -> Result<(Mode, Gvr), ProtocolError> {
    let mut parts = type_.splitn(4, '.');
    let mode = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedType(type_.to_owned()))?
        .parse::<Mode>()?;
    let group = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedType(type_.to_owned()))?;
    let version = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedType(type_.to_owned()))?;
    let resource = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedType(type_.to_owned()))?;
    Ok((mode, Gvr::new(group, version, resource)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_core_group() {
        let gvr = Gvr::new("", "v1", "secrets");
        let type_ = message_type(Mode::List, &gvr);
        assert_eq!(type_, "list..v1.secrets");
        let (mode, parsed) = parse_message_type(&type_).unwrap();
        assert_eq!(mode, Mode::List);
        assert_eq!(parsed, gvr);
    }

    #[test]
    fn round_trips_named_group() {
        let gvr = Gvr::new("apps", "v1", "deployments");
        let type_ = message_type(Mode::WatchResponse, &gvr);
        assert_eq!(type_, "watch_response.apps.v1.deployments");
        let (mode, parsed) = parse_message_type(&type_).unwrap();
        assert_eq!(mode, Mode::WatchResponse);
        assert_eq!(parsed, gvr);
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = parse_message_type("frobnicate..v1.secrets").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMode(_)));
    }

    #[test]
    fn rejects_truncated_type() {
        let err = parse_message_type("list..v1").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedType(_)));
    }

    #[test]
    fn api_version_core_vs_named_group() {
        assert_eq!(Gvr::new("", "v1", "secrets").api_version(), "v1");
        assert_eq!(
            Gvr::new("apps", "v1", "deployments").api_version(),
            "apps/v1"
        );
    }
}
