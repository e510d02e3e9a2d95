//! The in-flight request representation passed through the pre-call hooks

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata keys written by the header mapper
pub struct MetadataKeys;

impl MetadataKeys {
    pub const METADATA: &'static str = "metadata";
    pub const USER: &'static str = "user";
    pub const TRACE_USER_ID: &'static str = "trace_user_id";
    pub const SESSION_ID: &'static str = "session_id";
    pub const TRACE_METADATA: &'static str = "trace_metadata";
    pub const USER_EMAIL: &'static str = "user_email";
    pub const USER_ROLE: &'static str = "user_role";
}

/// A proxy request: its inbound headers plus the JSON body that is forwarded.
///
/// `metadata` and `user` live in the body exactly where the proxy expects them,
/// so a field that was absent on input stays absent on output unless a hook
/// sets it. A `"user": null` counts as present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(headers: Map<String, Value>, body: Map<String, Value>) -> Self {
        Self { headers, body }
    }

    /// Builds an envelope for an outgoing HTTP request. Header values that are
    /// not valid UTF-8 are dropped.
    pub fn from_http_parts(headers: &HeaderMap, body: Map<String, Value>) -> Self {
        let mut map = Map::new();
        for (name, value) in headers {
            match value.to_str() {
                Ok(v) => {
                    map.entry(name.as_str().to_string())
                        .or_insert_with(|| Value::String(v.to_string()));
                }
                Err(_) => tracing::debug!(header = %name, "Dropping non UTF-8 header value"),
            }
        }
        Self::new(map, body)
    }

    /// The JSON body to forward upstream (headers are not part of it)
    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.body.get(MetadataKeys::METADATA)
    }

    /// Whether a top-level `user` key is set, regardless of its value
    pub fn has_user(&self) -> bool {
        self.body.contains_key(MetadataKeys::USER)
    }

    pub fn user(&self) -> Option<&str> {
        self.body.get(MetadataKeys::USER).and_then(Value::as_str)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn trace_user_id(&self) -> Option<&str> {
        self.metadata_str(MetadataKeys::TRACE_USER_ID)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata_str(MetadataKeys::SESSION_ID)
    }

    pub fn trace_metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata()
            .and_then(|m| m.get(MetadataKeys::TRACE_METADATA))
            .and_then(Value::as_object)
    }

    pub fn model(&self) -> Option<&str> {
        self.body
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    pub fn is_stream(&self) -> bool {
        self.body
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn messages(&self) -> Option<&Value> {
        self.body.get("messages")
    }
}
