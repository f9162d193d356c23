mod autocomplete;
mod catalog;
mod config;
mod error;
mod fallback;
mod index;
mod model;
mod orchestrator;
mod search;
mod server;
mod viz;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog::CatalogLoader;
use config::Config;
use med_common::backend::{BackendClient, BackendClientConfig};
use med_common::groq::{GroqClient, GroqClientConfig};
use server::MedAssistServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting med-assist MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    let backend_config = BackendClientConfig::from_env();
    let groq_config = GroqClientConfig::from_env();
    info!(
        backend = %backend_config.base_url,
        groq = groq_config.api_key.is_some(),
        catalog_url = config.catalog_url.is_some(),
        catalog_path = config.catalog_path.is_some(),
        "configuration loaded"
    );

    // 2. Build the network clients
    let backend = Arc::new(BackendClient::new(backend_config)?);
    let groq = Arc::new(GroqClient::new(groq_config)?);
    if !groq.is_configured() {
        info!("GROQ_API_KEY not set, secondary tier disabled");
    }

    // 3. Resolve the drug catalog before serving
    let loader = CatalogLoader::new(config)?;
    let loaded = loader.load().await;
    info!(
        records = loaded.records.len(),
        source = loaded.source.label(),
        "catalog ready"
    );

    // 4. Build MCP server and serve on stdio
    let server = MedAssistServer::new(loaded, loader, backend, groq);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
