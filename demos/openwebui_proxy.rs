//! Sends chat requests through a LiteLLM proxy as two simulated Open WebUI users
//! and reports each call to Langfuse.
//!
//! Environment:
//! - LANGFUSE_HOST, LANGFUSE_PUBLIC_KEY, LANGFUSE_SECRET_KEY
//! - LITELLM_URL (default http://localhost:4000), LITELLM_API_KEY, LITELLM_MODEL

use dotenv::dotenv;
use openwebui_langfuse_tracing::{
    HeaderTracingMiddleware, HookChain, LangfuseConfig, LangfuseTraceLogger, OtelTraceSink,
};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use reqwest_middleware::ClientBuilder;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};

fn setup_tracer_provider(config: &LangfuseConfig) -> Result<TracerProvider, Box<dyn Error>> {
    let endpoint = format!("{}/v1/traces", config.otlp_endpoint());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint.clone())
        .with_headers(config.otlp_headers())
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(opentelemetry_sdk::Resource::new(vec![
            opentelemetry::KeyValue::new("service.name", "openwebui-proxy-demo"),
        ]))
        .build();

    info!("Exporting traces to Langfuse at: {}", endpoint);
    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("openwebui_langfuse_tracing=debug".parse()?),
        )
        .init();

    let config = LangfuseConfig::from_env()?;
    let provider = setup_tracer_provider(&config)?;

    // The logger gets its own tracer; nothing is registered globally
    let sink = OtelTraceSink::new(provider.tracer("openwebui-langfuse-tracing"));
    let logger = LangfuseTraceLogger::new(Arc::new(sink));

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(
            HeaderTracingMiddleware::new()
                .with_hook(HookChain::logging_mapper())
                .with_logger(logger),
        )
        .build();

    let base_url =
        std::env::var("LITELLM_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());
    let api_key = std::env::var("LITELLM_API_KEY").unwrap_or_else(|_| "sk-1234".to_string());
    let model = std::env::var("LITELLM_MODEL").unwrap_or_else(|_| "gpt-4".to_string());

    let users = [
        ("user-alice", "alice@example.com", "Alice Test", "user"),
        ("user-bob", "bob@example.com", "Bob Test", "admin"),
    ];

    for (index, (id, email, name, role)) in users.iter().enumerate() {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": "What is the capital of France?"}],
            "max_tokens": 50,
            "temperature": 0.7
        });

        let response = client
            .post(format!("{}/v1/chat/completions", base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("X-OpenWebUI-User-Id", *id)
            .header("X-OpenWebUI-User-Email", *email)
            .header("X-OpenWebUI-User-Name", *name)
            .header("X-OpenWebUI-User-Role", *role)
            .header("X-OpenWebUI-Chat-Id", format!("demo-chat-{}", index))
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            info!(user = %name, "Response: {}", text);
        } else {
            warn!(user = %name, %status, "Proxy returned an error: {}", text);
        }
    }

    // Flush pending spans before exit
    for result in provider.force_flush() {
        if let Err(e) = result {
            warn!("Failed to flush spans: {}", e);
        }
    }
    provider.shutdown()?;

    Ok(())
}
