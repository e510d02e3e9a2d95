//! reqwest middleware for a proxy's forwarding client.
//!
//! [`HeaderTracingMiddleware`] runs the pre-call hook over each outgoing JSON
//! request, rewrites the body when the hook changed it, and reports the
//! finished call to a [`LangfuseTraceLogger`] when one is configured.

use crate::envelope::RequestEnvelope;
use crate::hooks::PreCallHook;
use crate::mapper::HeaderMetadataMapper;
use crate::record::{CallOutcome, CallRecord, CallType, CompletionResponse};
use crate::trace::LangfuseTraceLogger;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::Extensions;
use reqwest::{Body, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::SystemTime;

/// Middleware that copies Open WebUI user headers into the forwarded request's
/// `metadata`/`user` fields and reports every call to Langfuse.
pub struct HeaderTracingMiddleware {
    hook: Arc<dyn PreCallHook>,
    logger: Option<LangfuseTraceLogger>,
}

impl Default for HeaderTracingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderTracingMiddleware {
    pub fn new() -> Self {
        Self {
            hook: Arc::new(HeaderMetadataMapper::new()),
            logger: None,
        }
    }

    /// Replaces the default mapper with another pre-call hook (e.g. a [`HookChain`](crate::HookChain))
    pub fn with_hook(mut self, hook: impl PreCallHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    pub fn with_logger(mut self, logger: LangfuseTraceLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    fn json_body(req: &Request) -> Option<Map<String, Value>> {
        let bytes = req.body()?.as_bytes()?;
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl Middleware for HeaderTracingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let start_time = SystemTime::now();
        let call_type = CallType::from_path(req.url().path());

        // Streaming and non-JSON bodies are forwarded as they are
        let body = Self::json_body(&req);
        let forward_json = body.is_some();
        let envelope = RequestEnvelope::from_http_parts(req.headers(), body.unwrap_or_default());
        let original_body = envelope.body.clone();

        let envelope = self.hook.pre_call(envelope, call_type);

        if forward_json && envelope.body != original_body {
            match serde_json::to_vec(&envelope.body) {
                Ok(bytes) => {
                    *req.body_mut() = Some(Body::from(bytes));
                    req.headers_mut().remove(CONTENT_LENGTH);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to re-encode request body, forwarding original"),
            }
        }

        let response = next.run(req, extensions).await;

        // Without a logger the response is returned as received, unbuffered
        let Some(logger) = &self.logger else {
            return response;
        };

        let (response, status_code, outcome, response_model) = match response {
            Ok(res) => {
                let status = res.status();
                if !status.is_success() {
                    let outcome = CallOutcome::Failure {
                        message: format!("HTTP {}", status),
                    };
                    (Ok(res), Some(status.as_u16()), outcome, None)
                } else if envelope.is_stream() {
                    (Ok(res), Some(status.as_u16()), CallOutcome::Stream, None)
                } else {
                    match buffer_response(res).await {
                        Ok((res, bytes)) => {
                            let parsed = CompletionResponse::from_slice(&bytes);
                            let outcome = CallOutcome::Success {
                                usage: parsed.as_ref().and_then(|p| p.usage),
                                output: parsed.as_ref().and_then(CompletionResponse::output_text),
                            };
                            let model = parsed.and_then(|p| p.model);
                            (Ok(res), Some(status.as_u16()), outcome, model)
                        }
                        Err(e) => {
                            let outcome = CallOutcome::Failure {
                                message: format!("Failed to read response body: {}", e),
                            };
                            (
                                Err(reqwest_middleware::Error::Reqwest(e)),
                                Some(status.as_u16()),
                                outcome,
                                None,
                            )
                        }
                    }
                }
            }
            Err(e) => {
                let outcome = CallOutcome::Failure {
                    message: format!("Request failed: {}", e),
                };
                (Err(e), None, outcome, None)
            }
        };

        let record = CallRecord {
            call_type,
            model: response_model.or_else(|| envelope.model().map(str::to_string)),
            status_code,
            start_time,
            end_time: SystemTime::now(),
            outcome,
        };
        logger.log_event(&envelope, &record);

        response
    }
}

/// Reads the body and rebuilds an equivalent response around the buffered bytes
async fn buffer_response(res: Response) -> reqwest::Result<(Response, Bytes)> {
    let status = res.status();
    let version = res.version();
    let headers = res.headers().clone();
    let bytes = res.bytes().await?;

    let mut rebuilt = http::Response::new(bytes.clone());
    *rebuilt.status_mut() = status;
    *rebuilt.version_mut() = version;
    *rebuilt.headers_mut() = headers;
    Ok((Response::from(rebuilt), bytes))
}
