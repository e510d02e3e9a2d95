//! Pre-call hooks run on every request before it is forwarded upstream

use crate::envelope::RequestEnvelope;
use crate::mapper::HeaderMetadataMapper;
use crate::record::CallType;
use std::sync::Arc;

/// A transform applied to a request before the model call.
///
/// Hooks must never fail the call; anything that goes wrong is logged and the
/// envelope is passed on.
pub trait PreCallHook: Send + Sync {
    fn pre_call(&self, envelope: RequestEnvelope, call_type: CallType) -> RequestEnvelope;
}

impl PreCallHook for HeaderMetadataMapper {
    fn pre_call(&self, envelope: RequestEnvelope, _call_type: CallType) -> RequestEnvelope {
        self.map(envelope)
    }
}

/// Logs the incoming request at debug level and passes it through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl PreCallHook for RequestLogger {
    fn pre_call(&self, envelope: RequestEnvelope, call_type: CallType) -> RequestEnvelope {
        match serde_json::to_string_pretty(&envelope) {
            Ok(data) => tracing::debug!(call_type = %call_type, %data, "Incoming request"),
            Err(e) => tracing::warn!(call_type = %call_type, error = %e, "Logging incoming request failed"),
        }
        envelope
    }
}

/// Runs hooks in registration order
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn PreCallHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the request, then maps Open WebUI headers
    pub fn logging_mapper() -> Self {
        Self::new()
            .with(RequestLogger)
            .with(HeaderMetadataMapper::new())
    }

    pub fn with<H: PreCallHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl PreCallHook for HookChain {
    fn pre_call(&self, envelope: RequestEnvelope, call_type: CallType) -> RequestEnvelope {
        self.hooks
            .iter()
            .fold(envelope, |envelope, hook| hook.pre_call(envelope, call_type))
    }
}
