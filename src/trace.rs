//! Reporting completed calls to Langfuse.
//!
//! [`LangfuseTraceLogger`] turns an enriched [`RequestEnvelope`] and the
//! [`CallRecord`] of its model call into a [`TraceRecord`] and hands it to a
//! [`TraceSink`]. The sink is passed in by the caller; there is no process-wide
//! client.

use crate::attributes::{ObservationAttributesBuilder, TraceAttributesBuilder};
use crate::envelope::{MetadataKeys, RequestEnvelope};
use crate::error::SinkError;
use crate::record::{token_count_i64, CallOutcome, CallRecord, CallType, Usage};
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    ERROR_TYPE, GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MODEL, GEN_AI_USAGE_INPUT_TOKENS,
    GEN_AI_USAGE_OUTPUT_TOKENS, HTTP_RESPONSE_STATUS_CODE,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

pub const LEVEL_DEFAULT: &str = "DEFAULT";
pub const LEVEL_ERROR: &str = "ERROR";

/// The model call inside a trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub name: String,
    pub call_type: CallType,
    pub model: Option<String>,
    pub level: &'static str,
    pub status_message: String,
    pub status_code: Option<u16>,
    pub usage: Option<Usage>,
    pub input: Option<Value>,
    pub output: Option<String>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub latency_ms: u64,
}

/// One Langfuse trace: identity of the caller plus the generation it made
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub name: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Value,
    pub generation: GenerationRecord,
}

impl TraceRecord {
    pub fn is_error(&self) -> bool {
        self.generation.level == LEVEL_ERROR
    }
}

/// Destination for finished traces
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: &TraceRecord) -> Result<(), SinkError>;
}

/// Builds traces from enriched requests and forwards them to a sink
#[derive(Clone)]
pub struct LangfuseTraceLogger {
    sink: Arc<dyn TraceSink>,
}

impl LangfuseTraceLogger {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink }
    }

    pub fn build_trace(envelope: &RequestEnvelope, record: &CallRecord) -> TraceRecord {
        let user_id = envelope
            .trace_user_id()
            .or_else(|| envelope.user().filter(|u| !u.is_empty()))
            .map(str::to_string);
        let session_id = envelope.session_id().map(str::to_string);
        let model = record
            .model
            .clone()
            .or_else(|| envelope.model().map(str::to_string));
        let user_role = envelope
            .trace_metadata()
            .and_then(|m| m.get(MetadataKeys::USER_ROLE))
            .and_then(Value::as_str);

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("open-webui"));
        if let Some(trace_metadata) = envelope.trace_metadata() {
            for (key, value) in trace_metadata {
                metadata.insert(key.clone(), value.clone());
            }
        }

        let tags = generate_tags(
            record.event_kind(),
            model.as_deref(),
            user_role,
            user_id.is_some(),
        );

        let (level, status_message, output) = match &record.outcome {
            CallOutcome::Success { output, .. } => (LEVEL_DEFAULT, "success".to_string(), output.clone()),
            CallOutcome::Stream => (LEVEL_DEFAULT, "success".to_string(), None),
            CallOutcome::Failure { message } => (LEVEL_ERROR, message.clone(), None),
        };

        TraceRecord {
            name: format!("openwebui-{}", session_id.as_deref().unwrap_or("unknown")),
            user_id,
            session_id,
            tags,
            metadata: Value::Object(metadata),
            generation: GenerationRecord {
                name: format!("litellm-{}", record.call_type),
                call_type: record.call_type,
                model,
                level,
                status_message,
                status_code: record.status_code,
                usage: record.usage(),
                input: envelope.messages().cloned(),
                output,
                start_time: record.start_time,
                end_time: record.end_time,
                latency_ms: record.latency().as_millis() as u64,
            },
        }
    }

    /// Records one finished call. Sink failures are logged, never returned.
    pub fn log_event(&self, envelope: &RequestEnvelope, record: &CallRecord) {
        let trace = Self::build_trace(envelope, record);
        match self.sink.record(&trace) {
            Ok(()) => tracing::info!(
                session = trace.session_id.as_deref().unwrap_or("-"),
                user = trace.user_id.as_deref().unwrap_or("-"),
                tokens = trace.generation.usage.and_then(|u| u.total()).unwrap_or(0),
                event = record.event_kind(),
                "Logged to Langfuse"
            ),
            Err(e) => tracing::error!(error = %e, trace = %trace.name, "Error logging to Langfuse"),
        }
    }
}

fn generate_tags(
    event_kind: &str,
    model: Option<&str>,
    user_role: Option<&str>,
    authenticated: bool,
) -> Vec<String> {
    let mut tags = vec![
        "open-webui".to_string(),
        event_kind.to_string(),
        format!("model:{}", model.unwrap_or("unknown")),
    ];
    if let Some(role) = user_role {
        tags.push(format!("role:{role}"));
    }
    tags.push(if authenticated { "authenticated" } else { "anonymous" }.to_string());
    tags
}

/// Emits each trace as an OpenTelemetry root span with a child generation span,
/// using the Langfuse attribute vocabulary.
pub struct OtelTraceSink<T> {
    tracer: T,
}

impl<T> OtelTraceSink<T> {
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> TraceSink for OtelTraceSink<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn record(&self, trace: &TraceRecord) -> Result<(), SinkError> {
        let generation = &trace.generation;

        let mut root_builder = TraceAttributesBuilder::new()
            .with_name(trace.name.clone())
            .with_tags(&trace.tags)
            .with_metadata(&trace.metadata);
        if let Some(user_id) = &trace.user_id {
            root_builder = root_builder.with_user_id(user_id.clone());
        }
        if let Some(session_id) = &trace.session_id {
            root_builder = root_builder.with_session_id(session_id.clone());
        }

        let root = self
            .tracer
            .span_builder(trace.name.clone())
            .with_kind(SpanKind::Internal)
            .with_start_time(generation.start_time)
            .with_attributes(root_builder.build())
            .start(&self.tracer);
        let cx = Context::new().with_span(root);

        let mut observation = ObservationAttributesBuilder::generation()
            .with_level(generation.level)
            .with_status_message(generation.status_message.clone())
            .with_metadata(&json!({ "latency_ms": generation.latency_ms }));
        if let Some(model) = &generation.model {
            observation = observation.with_model(model.clone());
        }
        if let Some(input) = &generation.input {
            observation = observation.with_input(input);
        }
        if let Some(output) = &generation.output {
            observation = observation.with_output(output.clone());
        }
        if let Some(usage) = &generation.usage {
            observation = observation.with_usage(usage);
        }

        let mut attributes = observation.build();
        attributes.push(KeyValue::new(
            GEN_AI_OPERATION_NAME,
            generation.call_type.operation_name(),
        ));
        if let Some(model) = &generation.model {
            attributes.push(KeyValue::new(GEN_AI_REQUEST_MODEL, model.clone()));
        }
        if let Some(usage) = &generation.usage {
            if let Some(input) = usage.prompt_tokens {
                attributes.push(KeyValue::new(GEN_AI_USAGE_INPUT_TOKENS, token_count_i64(input)));
            }
            if let Some(output) = usage.completion_tokens {
                attributes.push(KeyValue::new(GEN_AI_USAGE_OUTPUT_TOKENS, token_count_i64(output)));
            }
        }
        if let Some(status) = generation.status_code {
            attributes.push(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, status as i64));
        }

        let mut span = self
            .tracer
            .span_builder(generation.name.clone())
            .with_kind(SpanKind::Client)
            .with_start_time(generation.start_time)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &cx);

        if trace.is_error() {
            span.set_attribute(KeyValue::new(ERROR_TYPE, generation.status_message.clone()));
            span.set_status(Status::error(generation.status_message.clone()));
        } else {
            span.set_status(Status::Ok);
        }

        span.end_with_timestamp(generation.end_time);
        cx.span().end_with_timestamp(generation.end_time);
        Ok(())
    }
}

/// Appends one JSON line per trace, for deployments without a Langfuse backend
pub struct JsonlTraceSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlTraceSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|_| SinkError::Poisoned)
    }
}

impl JsonlTraceSink<File> {
    /// Opens `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> TraceSink for JsonlTraceSink<W> {
    fn record(&self, trace: &TraceRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(trace)?;
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}
