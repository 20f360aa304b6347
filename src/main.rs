use std::sync::Arc;

use cargoboard::{CargoboardServer, CarrierConfig, ShippingService};
use rmcp::ServiceExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = CarrierConfig::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let config = Arc::new(config);
    info!(
        base_url = config.base_url(),
        auth_scheme = %config.auth_scheme(),
        timeout_secs = config.timeout().as_secs(),
        "Starting cargoboard MCP server"
    );

    let service = Arc::new(ShippingService::new(config)?);
    let server = CargoboardServer::new(service)
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| error!(error = %e, "Failed to start MCP server"))?;

    let reason = server.waiting().await?;
    info!(?reason, "MCP server stopped");
    Ok(())
}
