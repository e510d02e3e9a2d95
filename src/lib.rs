//! # openwebui-langfuse-tracing
//!
//! Carries Open WebUI user identity through an LLM proxy into Langfuse traces.
//!
//! Open WebUI forwards the signed-in user as `X-OpenWebUI-*` request headers. This
//! library provides:
//! - [`HeaderMetadataMapper`], which copies those headers into the request's
//!   `metadata.trace_user_id`, `metadata.session_id`, `metadata.trace_metadata` and
//!   top-level `user` fields
//! - Pre-call hooks ([`PreCallHook`], [`HookChain`]) for running the mapper next to
//!   request logging
//! - [`LangfuseTraceLogger`], which reports finished calls to an injected
//!   [`TraceSink`] (OpenTelemetry spans for Langfuse, or JSON lines)
//! - [`HeaderTracingMiddleware`], a `reqwest-middleware` layer doing all of the above
//!   for requests forwarded with reqwest
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openwebui_langfuse_tracing::{
//!     HeaderTracingMiddleware, LangfuseTraceLogger, OtelTraceSink,
//! };
//! use reqwest_middleware::ClientBuilder;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tracer = opentelemetry::global::tracer("litellm-proxy");
//! let logger = LangfuseTraceLogger::new(Arc::new(OtelTraceSink::new(tracer)));
//!
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(HeaderTracingMiddleware::new().with_logger(logger))
//!     .build();
//!
//! client
//!     .post("http://localhost:4000/v1/chat/completions")
//!     .header("X-OpenWebUI-User-Id", "user-456")
//!     .header("X-OpenWebUI-Chat-Id", "chat-123")
//!     .body(r#"{"model": "gpt-4", "messages": [{"role": "user", "content": "Hi"}]}"#)
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod attributes;
mod envelope;
mod error;
mod headers;
mod hooks;
mod langfuse;
mod mapper;
mod middleware;
mod record;
mod trace;

// Re-export main types
pub use attributes::{LangfuseAttributes, ObservationAttributesBuilder, TraceAttributesBuilder};
pub use envelope::{MetadataKeys, RequestEnvelope};
pub use error::{ConfigError, MapError, SinkError};
pub use headers::{find_header, first_header, OpenWebUIHeaders};
pub use hooks::{HookChain, PreCallHook, RequestLogger};
pub use mapper::{HeaderMetadataMapper, OpenWebUIIdentity};
pub use middleware::HeaderTracingMiddleware;
pub use record::{
    CallOutcome, CallRecord, CallType, Choice, ChoiceMessage, CompletionResponse, Usage,
};
pub use trace::{
    GenerationRecord, JsonlTraceSink, LangfuseTraceLogger, OtelTraceSink, TraceRecord, TraceSink,
    LEVEL_DEFAULT, LEVEL_ERROR,
};

// Re-export langfuse utilities
pub use langfuse::{
    build_langfuse_auth_header, build_langfuse_auth_header_from_env,
    build_langfuse_otlp_endpoint_from_env, build_otlp_endpoint, LangfuseConfig,
    DEFAULT_LANGFUSE_HOST,
};
