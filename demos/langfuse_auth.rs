//! Prints the OTLP settings derived from the Langfuse environment variables

use dotenv::dotenv;
use openwebui_langfuse_tracing::LangfuseConfig;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    // Expects LANGFUSE_PUBLIC_KEY and LANGFUSE_SECRET_KEY; LANGFUSE_HOST defaults
    // to https://cloud.langfuse.com
    let config = LangfuseConfig::from_env()?;

    println!("OTLP Endpoint: {}", config.otlp_endpoint());
    println!("Authorization Header: {}", config.auth_header());

    println!("\nYou can now use these values to configure OpenTelemetry:");
    println!(
        "export OTEL_EXPORTER_OTLP_ENDPOINT=\"{}\"",
        config.otlp_endpoint()
    );
    println!(
        "export OTEL_EXPORTER_OTLP_HEADERS=\"Authorization={}\"",
        config.auth_header()
    );

    Ok(())
}
