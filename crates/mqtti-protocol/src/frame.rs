//! Frame and inner-document schema.

use serde::{Deserialize, Serialize};

use crate::{Gvr, Mode, Object, ProtocolError};

/// A request/response-correlating wire message. `payload` holds the
/// serialized inner document whose schema is determined by `type_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub source: String,
    pub payload: serde_json::Value,
}

impl Frame {
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        mode: Mode,
        gvr: &Gvr,
        source: impl Into<String>,
        body: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: id.into(),
            type_: crate::message_type(mode, gvr),
            source: source.into(),
            payload: serde_json::to_value(body)?,
        })
    }

    pub fn mode_and_gvr(&self) -> Result<(Mode, Gvr), ProtocolError> {
        crate::parse_message_type(&self.type_)
    }

    pub fn body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// List/field selectors and pagination carried on `list`/`watch` requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default, rename = "labelSelector", skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(default, rename = "fieldSelector", skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<String>,
    #[serde(default, rename = "resourceVersion", skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, rename = "timeoutSeconds", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
}

/// Request body for `list` and `watch`. `namespace: None` is the
/// all-namespaces sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub options: ListOptions,
}

/// Empty body for `stopwatch` — the frame `id` is the whole request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopWatchBody {}

/// `list_response` body. May be chunked across frames sharing an `id`; only
/// the final frame sets `end_of_list: true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponseBody {
    pub objects: Vec<Object>,
    #[serde(rename = "endOfList")]
    pub end_of_list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// `watch_response` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchResponseBody {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: Object,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_object(name: &str) -> Object {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": "default", "uid": "u", "resourceVersion": "1"},
        }))
        .unwrap()
    }

    #[test]
    fn frame_round_trips_request_body() {
        let gvr = Gvr::new("", "v1", "secrets");
        let body = RequestBody {
            namespace: Some("default".to_owned()),
            options: ListOptions::default(),
        };
        let frame = Frame::new("req-1", Mode::List, &gvr, "informer", &body).unwrap();
        let json = serde_json::to_string(&frame).unwrap();
        let decoded: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, frame);
        let (mode, decoded_gvr) = decoded.mode_and_gvr().unwrap();
        assert_eq!(mode, Mode::List);
        assert_eq!(decoded_gvr, gvr);
        let decoded_body: RequestBody = decoded.body().unwrap();
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn list_response_round_trips_with_end_of_list_flag() {
        let body = ListResponseBody {
            objects: vec![sample_object("alpha")],
            end_of_list: true,
        };
        let gvr = Gvr::new("", "v1", "secrets");
        let frame = Frame::new("req-1", Mode::ListResponse, &gvr, "sender", &body).unwrap();
        let decoded_body: ListResponseBody = frame.body().unwrap();
        assert!(decoded_body.end_of_list);
        assert_eq!(decoded_body.objects.len(), 1);
    }

    #[test]
    fn watch_response_event_type_serializes_lowercase() {
        let body = WatchResponseBody {
            event_type: WatchEventType::Modified,
            object: sample_object("alpha"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["type"], "modified");
    }

    #[test]
    fn malformed_payload_yields_decode_error() {
        let frame = Frame {
            id: "req-1".to_owned(),
            type_: "list..v1.secrets".to_owned(),
            source: "informer".to_owned(),
            payload: json!("not-an-object"),
        };
        let err = frame.body::<RequestBody>().unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
