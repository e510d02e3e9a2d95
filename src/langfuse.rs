//! Langfuse connection settings

use crate::error::ConfigError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::env;

pub const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";

const HOST_VAR: &str = "LANGFUSE_HOST";
const PUBLIC_KEY_VAR: &str = "LANGFUSE_PUBLIC_KEY";
const SECRET_KEY_VAR: &str = "LANGFUSE_SECRET_KEY";

/// Credentials and host of a Langfuse project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangfuseConfig {
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
}

impl LangfuseConfig {
    pub fn new(
        host: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        validate_host(&host)?;
        Ok(Self {
            host,
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        })
    }

    /// Reads `LANGFUSE_HOST` (optional), `LANGFUSE_PUBLIC_KEY` and `LANGFUSE_SECRET_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (public_key, secret_key) = keys_from_lookup(&lookup)?;
        let host = host_from_lookup(&lookup);

        Self::new(host, public_key, secret_key)
    }

    pub fn auth_header(&self) -> String {
        build_langfuse_auth_header(&self.public_key, &self.secret_key)
    }

    pub fn otlp_endpoint(&self) -> String {
        build_otlp_endpoint(&self.host)
    }

    /// Headers for an OTLP/HTTP exporter pointed at [`otlp_endpoint`](Self::otlp_endpoint)
    pub fn otlp_headers(&self) -> HashMap<String, String> {
        HashMap::from([("Authorization".to_string(), self.auth_header())])
    }
}

/// Builds a Langfuse authentication header value from public and secret keys.
///
/// The keys are joined with a colon and base64 encoded.
///
/// # Arguments
///
/// * `public_key` - The Langfuse public key
/// * `secret_key` - The Langfuse secret key
///
/// # Returns
///
/// The complete header value `"Basic {base64_encoded}"`.
///
/// # Example
///
/// ```rust
/// use openwebui_langfuse_tracing::build_langfuse_auth_header;
///
/// let auth = build_langfuse_auth_header("pk-lf-1234567890", "sk-lf-1234567890");
/// assert_eq!(auth, "Basic cGstbGYtMTIzNDU2Nzg5MDpzay1sZi0xMjM0NTY3ODkw");
/// ```
pub fn build_langfuse_auth_header(public_key: &str, secret_key: &str) -> String {
    let auth_string = format!("{}:{}", public_key, secret_key);
    let encoded = STANDARD.encode(auth_string.as_bytes());
    format!("Basic {}", encoded)
}

/// Builds a Langfuse authentication header value from environment variables.
///
/// Reads `LANGFUSE_PUBLIC_KEY` and `LANGFUSE_SECRET_KEY` the same way
/// [`LangfuseConfig::from_env`] does. `LANGFUSE_HOST` is not consulted.
///
/// # Returns
///
/// The complete header value `"Basic {base64_encoded}"`, or
/// [`ConfigError::MissingEnv`] when either key is unset or blank.
///
/// # Example
///
/// ```rust,no_run
/// use openwebui_langfuse_tracing::build_langfuse_auth_header_from_env;
///
/// let auth = build_langfuse_auth_header_from_env().unwrap();
/// assert!(auth.starts_with("Basic "));
/// ```
pub fn build_langfuse_auth_header_from_env() -> Result<String, ConfigError> {
    auth_header_from_lookup(|key| env::var(key).ok())
}

/// Builds the Langfuse OTLP endpoint URL by appending the API path.
///
/// # Arguments
///
/// * `base_url` - The base Langfuse URL (e.g., "https://cloud.langfuse.com")
///
/// # Returns
///
/// The base URL without trailing slashes, followed by `/api/public/otel`.
///
/// # Example
///
/// ```rust
/// use openwebui_langfuse_tracing::build_otlp_endpoint;
///
/// let endpoint = build_otlp_endpoint("https://cloud.langfuse.com/");
/// assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");
/// ```
pub fn build_otlp_endpoint(base_url: &str) -> String {
    let url = base_url.trim_end_matches('/');
    format!("{}/api/public/otel", url)
}

/// Builds the Langfuse OTLP endpoint URL from the `LANGFUSE_HOST` environment variable.
///
/// An unset or blank `LANGFUSE_HOST` falls back to [`DEFAULT_LANGFUSE_HOST`].
/// The keys are not needed here.
///
/// # Returns
///
/// The OTLP endpoint URL, or [`ConfigError::InvalidHost`] when the host is not
/// an http(s) URL.
///
/// # Example
///
/// ```rust,no_run
/// use openwebui_langfuse_tracing::build_langfuse_otlp_endpoint_from_env;
///
/// let endpoint = build_langfuse_otlp_endpoint_from_env().unwrap();
/// // endpoint = "https://cloud.langfuse.com/api/public/otel" when LANGFUSE_HOST is unset
/// ```
pub fn build_langfuse_otlp_endpoint_from_env() -> Result<String, ConfigError> {
    otlp_endpoint_from_lookup(|key| env::var(key).ok())
}

fn auth_header_from_lookup<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (public_key, secret_key) = keys_from_lookup(&lookup)?;
    Ok(build_langfuse_auth_header(&public_key, &secret_key))
}

fn otlp_endpoint_from_lookup<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = host_from_lookup(&lookup);
    validate_host(&host)?;
    Ok(build_otlp_endpoint(&host))
}

fn keys_from_lookup<F>(lookup: &F) -> Result<(String, String), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let public_key = non_empty(PUBLIC_KEY_VAR).ok_or(ConfigError::MissingEnv(PUBLIC_KEY_VAR))?;
    let secret_key = non_empty(SECRET_KEY_VAR).ok_or(ConfigError::MissingEnv(SECRET_KEY_VAR))?;
    Ok((public_key, secret_key))
}

fn host_from_lookup<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(HOST_VAR)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGFUSE_HOST.to_string())
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidHost {
            host: host.to_string(),
            message: "expected an http:// or https:// URL".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_build_langfuse_auth_header() {
        let auth = build_langfuse_auth_header("pk-lf-test", "sk-lf-secret");

        // The expected value is "Basic " + base64("pk-lf-test:sk-lf-secret")
        let expected = format!("Basic {}", STANDARD.encode("pk-lf-test:sk-lf-secret"));
        assert_eq!(auth, expected);
    }

    #[test]
    fn test_build_otlp_endpoint() {
        let endpoint = build_otlp_endpoint("https://cloud.langfuse.com");
        assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");

        let endpoint = build_otlp_endpoint("https://cloud.langfuse.com/");
        assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");

        let endpoint = build_otlp_endpoint("https://langfuse.internal:3000");
        assert_eq!(endpoint, "https://langfuse.internal:3000/api/public/otel");
    }

    #[test]
    fn test_config_from_lookup() {
        let config = LangfuseConfig::from_lookup(lookup(&[
            ("LANGFUSE_HOST", "https://us.cloud.langfuse.com/"),
            ("LANGFUSE_PUBLIC_KEY", "pk-lf-test"),
            ("LANGFUSE_SECRET_KEY", "sk-lf-secret"),
        ]))
        .unwrap();

        assert_eq!(config.otlp_endpoint(), "https://us.cloud.langfuse.com/api/public/otel");
        assert_eq!(
            config.otlp_headers().get("Authorization"),
            Some(&build_langfuse_auth_header("pk-lf-test", "sk-lf-secret"))
        );
    }

    #[test]
    fn test_config_defaults_host() {
        let config = LangfuseConfig::from_lookup(lookup(&[
            ("LANGFUSE_PUBLIC_KEY", "pk-lf-test"),
            ("LANGFUSE_SECRET_KEY", "sk-lf-secret"),
        ]))
        .unwrap();
        assert_eq!(config.host, DEFAULT_LANGFUSE_HOST);
    }

    #[test]
    fn test_config_missing_keys() {
        let err = LangfuseConfig::from_lookup(lookup(&[("LANGFUSE_SECRET_KEY", "sk")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv("LANGFUSE_PUBLIC_KEY"));
        assert!(err.to_string().contains("Missing LANGFUSE_PUBLIC_KEY"));

        let err = LangfuseConfig::from_lookup(lookup(&[
            ("LANGFUSE_PUBLIC_KEY", "pk"),
            ("LANGFUSE_SECRET_KEY", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv("LANGFUSE_SECRET_KEY"));
    }

    #[test]
    fn test_auth_header_from_lookup() {
        let auth = auth_header_from_lookup(lookup(&[
            ("LANGFUSE_HOST", "not-a-url"),
            ("LANGFUSE_PUBLIC_KEY", "pk-lf-1234567890"),
            ("LANGFUSE_SECRET_KEY", "sk-lf-1234567890"),
        ]))
        .unwrap();
        assert_eq!(auth, "Basic cGstbGYtMTIzNDU2Nzg5MDpzay1sZi0xMjM0NTY3ODkw");

        let err = auth_header_from_lookup(lookup(&[("LANGFUSE_PUBLIC_KEY", "pk")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv("LANGFUSE_SECRET_KEY"));
    }

    #[test]
    fn test_otlp_endpoint_defaults_host() {
        let endpoint = otlp_endpoint_from_lookup(lookup(&[])).unwrap();
        assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");

        let endpoint = otlp_endpoint_from_lookup(lookup(&[("LANGFUSE_HOST", " ")])).unwrap();
        assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");
    }

    #[test]
    fn test_otlp_endpoint_uses_host() {
        let endpoint =
            otlp_endpoint_from_lookup(lookup(&[("LANGFUSE_HOST", "http://localhost:3000/")]))
                .unwrap();
        assert_eq!(endpoint, "http://localhost:3000/api/public/otel");

        let err = otlp_endpoint_from_lookup(lookup(&[("LANGFUSE_HOST", "localhost:3000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost { .. }));
    }

    #[test]
    fn test_config_rejects_bad_host() {
        let err = LangfuseConfig::new("cloud.langfuse.com", "pk", "sk").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost { .. }));
    }
}
