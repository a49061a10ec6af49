//! Server configuration.

use std::time::Duration;

use clap::Parser;
use stackwright_core::OrchestratorConfig;
use stackwright_core::llm::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

#[derive(Parser, Debug, Clone)]
#[command(name = "stackwright-server", about = "Project scaffold generation service")]
pub struct ServerConfig {
    /// Address to listen on for HTTP.
    #[arg(long, env = "STACKWRIGHT_LISTEN_ADDR", default_value = "127.0.0.1:3000")]
    pub listen_addr: String,

    /// API key for the text-generation service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat completions endpoint.
    #[arg(long, env = "STACKWRIGHT_API_URL", default_value = DEFAULT_ENDPOINT)]
    pub api_url: String,

    /// Model for bundle stages and the streamed implementation.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Model for stack/feature/step/subtask suggestions and questions.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub suggestion_model: String,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Completion token limit for the streamed implementation.
    #[arg(long, default_value_t = 16_384)]
    pub stream_max_tokens: u32,

    /// Timeout for one non-streamed call, or for a streamed call to start.
    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Longest gap allowed between two streamed fragments.
    #[arg(long, default_value_t = 60)]
    pub stream_idle_timeout_secs: u64,

    /// Extra allowed CORS origin (can be repeated).
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            stream_max_tokens: self.stream_max_tokens,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            api_key: None,
            api_url: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            suggestion_model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            stream_max_tokens: 16_384,
            request_timeout_secs: 120,
            stream_idle_timeout_secs: 60,
            cors_origins: vec![],
        }
    }
}
