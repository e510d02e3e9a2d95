//! Description of a completed model call, validated once at the HTTP boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Kind of OpenAI-compatible operation, derived from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    ChatCompletion,
    Completion,
    Embedding,
    ImageGeneration,
    Unknown,
}

impl CallType {
    pub fn from_path(path: &str) -> Self {
        if path.contains("/chat/completions") {
            CallType::ChatCompletion
        } else if path.contains("/completions") {
            CallType::Completion
        } else if path.contains("/embeddings") {
            CallType::Embedding
        } else if path.contains("/images/generations") {
            CallType::ImageGeneration
        } else {
            CallType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::ChatCompletion => "chat_completion",
            CallType::Completion => "completion",
            CallType::Embedding => "embedding",
            CallType::ImageGeneration => "image_generation",
            CallType::Unknown => "unknown",
        }
    }

    /// Value for the `gen_ai.operation.name` attribute
    pub fn operation_name(&self) -> &'static str {
        match self {
            CallType::ChatCompletion => "chat",
            CallType::Completion => "text_completion",
            CallType::Embedding => "embeddings",
            CallType::ImageGeneration => "image_generation",
            CallType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage as reported by the upstream. Every field is optional since
/// providers disagree on which ones they send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Reported total, or prompt + completion when the total is missing
    pub fn total(&self) -> Option<u64> {
        self.total_tokens.or(match (self.prompt_tokens, self.completion_tokens) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0).saturating_add(c.unwrap_or(0))),
        })
    }
}

/// Token counts as OpenTelemetry integers, clamped at `i64::MAX`
pub(crate) fn token_count_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub text: Option<String>,
}

/// The parts of an OpenAI-compatible response body the trace needs
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!(error = %e, "Response body is not an OpenAI-compatible JSON object");
                None
            }
        }
    }

    /// First choice's message content, or its text for plain completions
    pub fn output_text(&self) -> Option<String> {
        let choice = self.choices.first()?;
        choice
            .message
            .as_ref()
            .and_then(|m| m.content.clone())
            .or_else(|| choice.text.clone())
    }
}

/// How the call ended
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success {
        usage: Option<Usage>,
        output: Option<String>,
    },
    /// Streamed response handed back to the caller without buffering
    Stream,
    Failure {
        message: String,
    },
}

/// A finished call as seen by the trace logger
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub call_type: CallType,
    pub model: Option<String>,
    /// HTTP status of the upstream response, when one was received
    pub status_code: Option<u16>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub outcome: CallOutcome,
}

impl CallRecord {
    pub fn latency(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, CallOutcome::Failure { .. })
    }

    /// `completion`, `stream_completion` or `error`
    pub fn event_kind(&self) -> &'static str {
        match self.outcome {
            CallOutcome::Success { .. } => "completion",
            CallOutcome::Stream => "stream_completion",
            CallOutcome::Failure { .. } => "error",
        }
    }

    pub fn usage(&self) -> Option<Usage> {
        match &self.outcome {
            CallOutcome::Success { usage, .. } => *usage,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_type_from_path() {
        assert_eq!(CallType::from_path("/v1/chat/completions"), CallType::ChatCompletion);
        assert_eq!(
            CallType::from_path("/openai/deployments/gpt-4/chat/completions"),
            CallType::ChatCompletion
        );
        assert_eq!(CallType::from_path("/v1/completions"), CallType::Completion);
        assert_eq!(CallType::from_path("/v1/embeddings"), CallType::Embedding);
        assert_eq!(CallType::from_path("/v1/images/generations"), CallType::ImageGeneration);
        assert_eq!(CallType::from_path("/v1/models"), CallType::Unknown);
        assert_eq!(CallType::ChatCompletion.to_string(), "chat_completion");
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            total_tokens: None,
        };
        assert_eq!(usage.total(), Some(15));

        let usage = Usage {
            total_tokens: Some(20),
            ..usage
        };
        assert_eq!(usage.total(), Some(20));
        assert_eq!(Usage::default().total(), None);
    }

    #[test]
    fn test_usage_total_saturates_on_huge_counts() {
        let response = CompletionResponse::from_slice(
            br#"{"choices": [], "usage": {"prompt_tokens": 18446744073709551615, "completion_tokens": 1}}"#,
        )
        .unwrap();
        let usage = response.usage.unwrap();
        assert_eq!(usage.total(), Some(u64::MAX));

        assert_eq!(token_count_i64(u64::MAX), i64::MAX);
        assert_eq!(token_count_i64(13), 13);
    }

    #[test]
    fn test_parse_chat_response() {
        let body = br#"{
            "id": "chatcmpl-1",
            "model": "qwen3-32b",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }"#;

        let response = CompletionResponse::from_slice(body).unwrap();
        assert_eq!(response.model.as_deref(), Some("qwen3-32b"));
        assert_eq!(response.output_text().as_deref(), Some("Paris"));
        assert_eq!(response.usage.and_then(|u| u.total()), Some(13));
    }

    #[test]
    fn test_parse_completion_and_embedding_responses() {
        let completion =
            CompletionResponse::from_slice(br#"{"choices": [{"text": "hello"}]}"#).unwrap();
        assert_eq!(completion.output_text().as_deref(), Some("hello"));

        let embedding = CompletionResponse::from_slice(
            br#"{"data": [{"embedding": [0.1, 0.2]}], "usage": {"prompt_tokens": 3, "total_tokens": 3}}"#,
        )
        .unwrap();
        assert_eq!(embedding.output_text(), None);
        assert_eq!(embedding.usage.and_then(|u| u.total()), Some(3));

        assert!(CompletionResponse::from_slice(b"not json").is_none());
    }

    #[test]
    fn test_record_event_kind_and_latency() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let record = CallRecord {
            call_type: CallType::ChatCompletion,
            model: None,
            status_code: Some(500),
            start_time: start,
            end_time: start + Duration::from_millis(250),
            outcome: CallOutcome::Failure {
                message: "HTTP 500".to_string(),
            },
        };
        assert_eq!(record.event_kind(), "error");
        assert!(record.is_failure());
        assert_eq!(record.latency(), Duration::from_millis(250));
        assert_eq!(record.usage(), None);

        let reversed = CallRecord {
            end_time: start - Duration::from_secs(1),
            outcome: CallOutcome::Stream,
            ..record
        };
        assert_eq!(reversed.latency(), Duration::ZERO);
        assert_eq!(reversed.event_kind(), "stream_completion");
    }
}
