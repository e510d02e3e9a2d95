//! Maps Open WebUI user headers onto Langfuse trace metadata.
//!
//! The proxy forwards `metadata.trace_user_id`, `metadata.session_id` and
//! `metadata.trace_metadata` to Langfuse, and uses the top-level `user` field for
//! its own spend tracking. This module fills those in from the headers Open WebUI
//! attaches to every request.

use crate::envelope::{MetadataKeys, RequestEnvelope};
use crate::error::{json_type_name, MapError};
use crate::headers::{find_header, first_header, OpenWebUIHeaders};
use serde_json::{Map, Value};

/// Identity fields resolved from the Open WebUI headers of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenWebUIIdentity {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<String>,
}

impl OpenWebUIIdentity {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.session_id.is_none()
            && !self.has_trace_metadata()
    }

    /// Whether anything belongs under `metadata.trace_metadata`
    pub fn has_trace_metadata(&self) -> bool {
        self.user_email.is_some() || self.user_role.is_some()
    }
}

/// Stateless header-to-metadata transform, safe to share across requests
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderMetadataMapper;

impl HeaderMetadataMapper {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the recognized headers without touching any envelope
    pub fn resolve(headers: &Map<String, Value>) -> OpenWebUIIdentity {
        let get = |name: &str| find_header(headers, name).map(str::to_string);

        OpenWebUIIdentity {
            user_id: first_header(headers, &OpenWebUIHeaders::USER_IDENTIFIERS)
                .map(str::to_string),
            session_id: get(OpenWebUIHeaders::CHAT_ID),
            user_email: get(OpenWebUIHeaders::USER_EMAIL),
            user_role: get(OpenWebUIHeaders::USER_ROLE),
        }
    }

    /// Merges the resolved identity into `envelope`.
    ///
    /// Existing metadata keys other than the ones listed in [`MetadataKeys`] are
    /// left alone, and a `user` that is already set is never replaced. On error the
    /// envelope has not been modified.
    pub fn try_map(&self, envelope: &mut RequestEnvelope) -> Result<OpenWebUIIdentity, MapError> {
        let identity = Self::resolve(&envelope.headers);
        if identity.is_empty() {
            return Ok(identity);
        }

        {
            let metadata = metadata_mut(&mut envelope.body)?;

            if identity.has_trace_metadata() {
                if let Some(existing) = metadata.get(MetadataKeys::TRACE_METADATA) {
                    if !existing.is_object() {
                        return Err(MapError::TraceMetadataNotObject {
                            found: json_type_name(existing),
                        });
                    }
                }
            }

            if let Some(user_id) = &identity.user_id {
                metadata.insert(
                    MetadataKeys::TRACE_USER_ID.to_string(),
                    Value::String(user_id.clone()),
                );
                tracing::debug!(user_id = %user_id, "Mapped Open WebUI user to trace_user_id");
            }

            if let Some(session_id) = &identity.session_id {
                metadata.insert(
                    MetadataKeys::SESSION_ID.to_string(),
                    Value::String(session_id.clone()),
                );
                tracing::debug!(session_id = %session_id, "Mapped Open WebUI chat to session_id");
            }

            if identity.has_trace_metadata() {
                let trace_metadata = metadata
                    .entry(MetadataKeys::TRACE_METADATA)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(trace_metadata) = trace_metadata {
                    if let Some(email) = &identity.user_email {
                        trace_metadata.insert(
                            MetadataKeys::USER_EMAIL.to_string(),
                            Value::String(email.clone()),
                        );
                    }
                    if let Some(role) = &identity.user_role {
                        trace_metadata.insert(
                            MetadataKeys::USER_ROLE.to_string(),
                            Value::String(role.clone()),
                        );
                    }
                }
                tracing::debug!("Added Open WebUI user context to trace metadata");
            }
        }

        if let Some(user_id) = &identity.user_id {
            if !envelope.has_user() {
                envelope.body.insert(
                    MetadataKeys::USER.to_string(),
                    Value::String(user_id.clone()),
                );
            }
        }

        Ok(identity)
    }

    /// Infallible form of [`try_map`](Self::try_map): faults are logged and the
    /// envelope is returned as it came in.
    pub fn map(&self, mut envelope: RequestEnvelope) -> RequestEnvelope {
        if let Err(e) = self.try_map(&mut envelope) {
            tracing::warn!(error = %e, "Failed to map Open WebUI headers to Langfuse");
        }
        envelope
    }
}

fn metadata_mut(body: &mut Map<String, Value>) -> Result<&mut Map<String, Value>, MapError> {
    let metadata = body
        .entry(MetadataKeys::METADATA)
        .or_insert_with(|| Value::Object(Map::new()));
    let found = json_type_name(metadata);
    metadata
        .as_object_mut()
        .ok_or(MapError::MetadataNotObject { found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> RequestEnvelope {
        serde_json::from_value(value).unwrap()
    }

    fn map(value: Value) -> RequestEnvelope {
        HeaderMetadataMapper::new().map(envelope(value))
    }

    #[test]
    fn test_all_headers() {
        let result = map(json!({
            "headers": {
                "X-OpenWebUI-User-Id": "user123",
                "X-OpenWebUI-User-Email": "test@example.com",
                "X-OpenWebUI-User-Role": "admin",
                "X-OpenWebUI-Chat-Id": "chat456"
            },
            "messages": [{"role": "user", "content": "Hello"}]
        }));

        let metadata = result.metadata().unwrap();
        assert_eq!(metadata["trace_user_id"], "user123");
        assert_eq!(metadata["session_id"], "chat456");
        assert_eq!(metadata["trace_metadata"]["user_email"], "test@example.com");
        assert_eq!(metadata["trace_metadata"]["user_role"], "admin");
        assert_eq!(result.user(), Some("user123"));
    }

    #[test]
    fn test_missing_headers_leaves_envelope_unchanged() {
        let original = envelope(json!({
            "headers": {"Authorization": "Bearer sk-1234", "Content-Type": "application/json"},
            "messages": [{"role": "user", "content": "Hello"}]
        }));

        let result = HeaderMetadataMapper::new().map(original.clone());
        assert_eq!(result, original);
        assert!(result.metadata().is_none());
        assert!(!result.has_user());
    }

    #[test]
    fn test_no_headers_key() {
        let original = envelope(json!({"metadata": {"tags": ["a"]}}));
        let result = HeaderMetadataMapper::new().map(original.clone());
        assert_eq!(result, original);
    }

    #[test]
    fn test_user_name_fallback() {
        let result = map(json!({
            "headers": {"X-OpenWebUI-User-Name": "john_doe"},
            "messages": [{"role": "user", "content": "Hello"}]
        }));

        let metadata = result.metadata().unwrap();
        assert_eq!(metadata["trace_user_id"], "john_doe");
        assert_eq!(result.user(), Some("john_doe"));
        assert!(metadata.get("session_id").is_none());
        assert!(metadata.get("trace_metadata").is_none());
    }

    #[test]
    fn test_lowercase_headers_match_canonical() {
        let lower = map(json!({
            "headers": {"x-openwebui-user-id": "user789", "x-openwebui-chat-id": "chat789"}
        }));
        let canonical = map(json!({
            "headers": {"X-OpenWebUI-User-Id": "user789", "X-OpenWebUI-Chat-Id": "chat789"}
        }));

        assert_eq!(lower.metadata(), canonical.metadata());
        assert_eq!(lower.user(), canonical.user());
        assert_eq!(lower.session_id(), Some("chat789"));
    }

    #[test]
    fn test_existing_user_is_kept() {
        let result = map(json!({
            "headers": {"X-OpenWebUI-User-Id": "user123"},
            "user": "preassigned"
        }));

        assert_eq!(result.trace_user_id(), Some("user123"));
        assert_eq!(result.user(), Some("preassigned"));
    }

    #[test]
    fn test_falsy_user_is_still_present() {
        let result = map(json!({
            "headers": {"X-OpenWebUI-User-Id": "user123"},
            "user": ""
        }));
        assert_eq!(result.user(), Some(""));
    }

    #[test]
    fn test_preserves_unmanaged_metadata() {
        let result = map(json!({
            "headers": {
                "X-OpenWebUI-User-Role": "user",
                "X-OpenWebUI-Chat-Id": "chat1"
            },
            "metadata": {
                "tags": ["prod"],
                "trace_metadata": {"team": "research"}
            }
        }));

        let metadata = result.metadata().unwrap();
        assert_eq!(metadata["tags"], json!(["prod"]));
        assert_eq!(metadata["session_id"], "chat1");
        assert_eq!(
            metadata["trace_metadata"],
            json!({"team": "research", "user_role": "user"})
        );
        assert!(metadata.get("trace_user_id").is_none());
        assert!(!result.has_user());
    }

    #[test]
    fn test_email_only_creates_trace_metadata() {
        let result = map(json!({
            "headers": {"X-OpenWebUI-User-Email": "alice@example.com"}
        }));

        assert_eq!(
            result.metadata(),
            Some(&json!({"trace_metadata": {"user_email": "alice@example.com"}}))
        );
        assert!(!result.has_user());
    }

    #[test]
    fn test_idempotent() {
        let headers = json!({
            "X-OpenWebUI-User-Id": "user123",
            "X-OpenWebUI-User-Email": "test@example.com",
            "X-OpenWebUI-Chat-Id": "chat456"
        });
        let mapper = HeaderMetadataMapper::new();

        let once = mapper.map(envelope(json!({"headers": headers})));
        let twice = mapper.map(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_non_object_metadata_is_left_alone() {
        let original = envelope(json!({
            "headers": {"X-OpenWebUI-User-Id": "user123"},
            "metadata": "not-a-map"
        }));

        let mut attempt = original.clone();
        let err = HeaderMetadataMapper::new().try_map(&mut attempt).unwrap_err();
        assert_eq!(err, MapError::MetadataNotObject { found: "string" });
        assert_eq!(attempt, original);

        assert_eq!(HeaderMetadataMapper::new().map(original.clone()), original);
    }

    #[test]
    fn test_non_object_trace_metadata_is_left_alone() {
        let original = envelope(json!({
            "headers": {
                "X-OpenWebUI-User-Id": "user123",
                "X-OpenWebUI-User-Role": "admin"
            },
            "metadata": {"trace_metadata": ["x"]}
        }));

        let mut attempt = original.clone();
        let err = HeaderMetadataMapper::new().try_map(&mut attempt).unwrap_err();
        assert_eq!(err, MapError::TraceMetadataNotObject { found: "array" });
        assert_eq!(attempt, original);
    }

    #[test]
    fn test_resolve() {
        let headers = json!({
            "x-openwebui-user-name": "Alice Test",
            "X-OpenWebUI-User-Role": "user",
            "X-OpenWebUI-Chat-Id": ""
        });
        let identity = HeaderMetadataMapper::resolve(headers.as_object().unwrap());

        assert_eq!(
            identity,
            OpenWebUIIdentity {
                user_id: Some("Alice Test".to_string()),
                session_id: None,
                user_email: None,
                user_role: Some("user".to_string()),
            }
        );
        assert!(!identity.is_empty());
        assert!(OpenWebUIIdentity::default().is_empty());
    }
}
