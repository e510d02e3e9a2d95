//! Open WebUI forwarded user headers
//!
//! Open WebUI sends these when `ENABLE_FORWARD_USER_INFO_HEADERS=true`. Upstream
//! proxies are free to change the casing, so every lookup here ignores ASCII case.

use serde_json::{Map, Value};

/// Header names forwarded by Open WebUI
pub struct OpenWebUIHeaders;

impl OpenWebUIHeaders {
    pub const USER_ID: &'static str = "X-OpenWebUI-User-Id";
    pub const USER_NAME: &'static str = "X-OpenWebUI-User-Name";
    pub const CHAT_ID: &'static str = "X-OpenWebUI-Chat-Id";
    pub const USER_EMAIL: &'static str = "X-OpenWebUI-User-Email";
    pub const USER_ROLE: &'static str = "X-OpenWebUI-User-Role";

    /// Headers tried, in order, to identify the user
    pub const USER_IDENTIFIERS: [&'static str; 2] = [Self::USER_ID, Self::USER_NAME];
}

/// Finds the first non-empty string value whose header name matches `name`
/// in any casing. Headers are scanned in insertion order.
pub fn find_header<'a>(headers: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    for (key, value) in headers {
        if !key.eq_ignore_ascii_case(name) {
            continue;
        }
        match value {
            Value::String(s) if !s.is_empty() => return Some(s.as_str()),
            Value::String(_) => {}
            other => {
                tracing::debug!(header = %key, value = %other, "Ignoring non-string header value");
            }
        }
    }
    None
}

/// Returns the first hit across `names`, tried in order
pub fn first_header<'a>(headers: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| find_header(headers, name))
}
