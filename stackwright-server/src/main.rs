use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (STACKWRIGHT_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("STACKWRIGHT_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("stackwright_server=info".parse()?)
        .add_directive("stackwright_core=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = stackwright_server::config::ServerConfig::parse();
    tracing::info!("Starting stackwright server on {}", config.listen_addr);
    tracing::info!(model = %config.model, suggestion_model = %config.suggestion_model, "Models");
    if !config.cors_origins.is_empty() {
        tracing::info!("Extra CORS origins: {}", config.cors_origins.join(", "));
    }

    let server = stackwright_server::server::Server::new(config)?;
    server.run().await
}
