//! Server lifecycle: shared state, listener, and serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use stackwright_core::suggest::Suggester;
use stackwright_core::{OpenAiClient, Orchestrator, TextGenerator};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// State shared by every request handler. Requests never mutate it.
pub struct AppState {
    pub config: ServerConfig,
    pub orchestrator: Orchestrator,
    pub suggester: Suggester,
}

impl AppState {
    pub fn new(config: ServerConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let orchestrator =
            Orchestrator::new(generator.clone()).with_config(config.orchestrator_config());
        let suggester = Suggester::new(generator)
            .with_model(&config.suggestion_model)
            .with_temperature(config.temperature);
        Self {
            config,
            orchestrator,
            suggester,
        }
    }
}

pub struct Server {
    config: ServerConfig,
    generator: Arc<dyn TextGenerator>,
}

impl Server {
    /// Create a server backed by the configured chat completions endpoint.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("API key is not configured (set OPENAI_API_KEY or --api-key)")?;
        let client = OpenAiClient::new(api_key)
            .with_endpoint(&config.api_url)
            .with_request_timeout(config.request_timeout())
            .with_idle_timeout(config.stream_idle_timeout());
        Ok(Self {
            config,
            generator: Arc::new(client),
        })
    }

    /// Create a server with a custom generator (for testing).
    pub fn with_generator(config: ServerConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self { config, generator }
    }

    fn build_state(self) -> Arc<AppState> {
        Arc::new(AppState::new(self.config, self.generator))
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        tracing::info!("HTTP listener on {}", listener.local_addr()?);

        let app = crate::web::router(self.build_state());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Bind and serve in the background. Returns the bound address.
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        let addr = listener.local_addr()?;
        tracing::info!("Listening on {addr}");

        let app = crate::web::router(self.build_state());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await?;
            Ok(())
        });
        Ok((addr, handle))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
