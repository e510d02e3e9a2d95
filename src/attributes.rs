//! Langfuse OpenTelemetry attribute management
//!
//! Langfuse reads trace identity (user, session, tags, metadata) and generation
//! details from well-known span attributes on spans received at its OTLP endpoint.

use crate::record::{token_count_i64, Usage};
use opentelemetry::KeyValue;
use serde_json::Value;

/// Langfuse-specific OpenTelemetry span attribute names
pub struct LangfuseAttributes;

impl LangfuseAttributes {
    // Trace attributes
    pub const TRACE_NAME: &'static str = "langfuse.trace.name";
    pub const TRACE_USER_ID: &'static str = "user.id";
    pub const TRACE_SESSION_ID: &'static str = "session.id";
    pub const TRACE_TAGS: &'static str = "langfuse.trace.tags";
    pub const TRACE_METADATA: &'static str = "langfuse.trace.metadata";

    // Observation attributes
    pub const OBSERVATION_TYPE: &'static str = "langfuse.observation.type";
    pub const OBSERVATION_METADATA: &'static str = "langfuse.observation.metadata";
    pub const OBSERVATION_LEVEL: &'static str = "langfuse.observation.level";
    pub const OBSERVATION_STATUS_MESSAGE: &'static str = "langfuse.observation.status_message";
    pub const OBSERVATION_INPUT: &'static str = "langfuse.observation.input";
    pub const OBSERVATION_OUTPUT: &'static str = "langfuse.observation.output";

    // Generation-specific observation attributes
    pub const OBSERVATION_MODEL: &'static str = "langfuse.observation.model.name";
    pub const OBSERVATION_USAGE_TOTAL: &'static str = "langfuse.observation.usage.total";
    pub const OBSERVATION_USAGE_DETAILS: &'static str = "langfuse.observation.usage_details";
}

/// Builder for creating Langfuse trace attributes
#[derive(Default)]
pub struct TraceAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl TraceAttributesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(LangfuseAttributes::TRACE_NAME, name.into()));
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::TRACE_USER_ID,
            user_id.into(),
        ));
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::TRACE_SESSION_ID,
            session_id.into(),
        ));
        self
    }

    pub fn with_tags(mut self, tags: &[String]) -> Self {
        // Langfuse expects a JSON array string
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string());
        self.attributes
            .push(KeyValue::new(LangfuseAttributes::TRACE_TAGS, tags_json));
        self
    }

    pub fn with_metadata(mut self, metadata: &Value) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::TRACE_METADATA,
            metadata.to_string(),
        ));
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}

/// Builder for creating Langfuse observation/generation attributes
pub struct ObservationAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl ObservationAttributesBuilder {
    pub fn new(observation_type: &str) -> Self {
        Self {
            attributes: vec![KeyValue::new(
                LangfuseAttributes::OBSERVATION_TYPE,
                observation_type.to_string(),
            )],
        }
    }

    pub fn generation() -> Self {
        Self::new("generation")
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::OBSERVATION_MODEL,
            model.into(),
        ));
        self
    }

    pub fn with_metadata(mut self, metadata: &Value) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::OBSERVATION_METADATA,
            metadata.to_string(),
        ));
        self
    }

    pub fn with_input(mut self, input: &Value) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::OBSERVATION_INPUT,
            input.to_string(),
        ));
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::OBSERVATION_OUTPUT,
            output.into(),
        ));
        self
    }

    /// `DEFAULT` for normal generations, `ERROR` for failed calls
    pub fn with_level(mut self, level: &'static str) -> Self {
        self.attributes
            .push(KeyValue::new(LangfuseAttributes::OBSERVATION_LEVEL, level));
        self
    }

    pub fn with_status_message(mut self, message: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            LangfuseAttributes::OBSERVATION_STATUS_MESSAGE,
            message.into(),
        ));
        self
    }

    pub fn with_usage(mut self, usage: &Usage) -> Self {
        if let Some(total) = usage.total() {
            self.attributes.push(KeyValue::new(
                LangfuseAttributes::OBSERVATION_USAGE_TOTAL,
                token_count_i64(total),
            ));
        }
        let mut details = serde_json::Map::new();
        if let Some(input) = usage.prompt_tokens {
            details.insert("input".to_string(), Value::from(input));
        }
        if let Some(output) = usage.completion_tokens {
            details.insert("output".to_string(), Value::from(output));
        }
        if !details.is_empty() {
            self.attributes.push(KeyValue::new(
                LangfuseAttributes::OBSERVATION_USAGE_DETAILS,
                Value::Object(details).to_string(),
            ));
        }
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}
