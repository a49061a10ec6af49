//! Chat-completions client for the generative text service.
//!
//! Every generation stage goes through the [`TextGenerator`] seam: one
//! structured prompt in, either a complete text or a lazy stream of text
//! fragments out. [`OpenAiClient`] is the HTTP implementation; tests swap in
//! the scripted generator from [`crate::testing`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::sse;

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default model for every stage.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Lazy, ordered sequence of text fragments from a streamed completion.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Errors raised by a text-generation call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("service returned no content")]
    EmptyResponse,
    #[error("could not decode service response: {0}")]
    Decode(String),
    #[error("upstream stream failed: {0}")]
    Stream(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e.to_string())
    }
}

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Instructions for the system role. Empty means "user message only".
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// A prompt carried entirely by the user role.
    pub fn user_only(user: impl Into<String>) -> Self {
        Self::new(String::new(), user)
    }
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: Option<f32>,
    /// Ask the service to emit a single JSON object.
    pub json_mode: bool,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            json_mode: false,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The capability every stage is built on.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt and return the whole text.
    ///
    /// Fails with [`LlmError::EmptyResponse`] when the service answers
    /// without content.
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String, LlmError>;

    /// Complete a prompt as an incremental fragment stream.
    ///
    /// The returned future resolves once the service has accepted the
    /// request; fragments are pulled lazily afterwards.
    async fn generate_stream(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<FragmentStream, LlmError>;
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl<'a> ChatRequest<'a> {
    fn build(prompt: &'a Prompt, options: &'a GenerationOptions, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &prompt.system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });
        Self {
            model: &options.model,
            messages,
            temperature: options.temperature,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            max_completion_tokens: options.max_tokens,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

// ── HTTP client ────────────────────────────────────────────────────────

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http: reqwest::Client::new(),
            request_timeout: Duration::from_secs(120),
            idle_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Timeout for a whole non-streamed call, and for a streamed call to be
    /// accepted.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Longest gap tolerated between two streamed fragments.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    async fn send(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = ChatRequest::build(prompt, options, stream);
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        let resp = self.send(prompt, options, false).await?;
        let parsed = resp
            .json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        parsed.into_text()
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        tracing::debug!(model = %options.model, json = options.json_mode, "Completion request");
        tokio::time::timeout(self.request_timeout, self.complete(prompt, options))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout))?
    }

    async fn generate_stream(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<FragmentStream, LlmError> {
        tracing::debug!(model = %options.model, "Streaming completion request");
        let resp = tokio::time::timeout(self.request_timeout, self.send(prompt, options, true))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout))??;
        Ok(sse::fragments(resp.bytes_stream(), self.idle_timeout).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_empty_system_and_optional_fields() {
        let prompt = Prompt::user_only("suggest stacks");
        let options = GenerationOptions::new("gpt-4o");
        let body = serde_json::to_value(ChatRequest::build(&prompt, &options, false)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [{ "role": "user", "content": "suggest stacks" }],
            })
        );
    }

    #[test]
    fn request_carries_json_mode_and_token_limit() {
        let prompt = Prompt::new("sys", "usr");
        let options = GenerationOptions::new("m")
            .with_temperature(0.5)
            .json()
            .with_max_tokens(128);
        let body = serde_json::to_value(ChatRequest::build(&prompt, &options, true)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_completion_tokens"], 128);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn missing_or_blank_content_is_empty_response() {
        let none: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(none.into_text(), Err(LlmError::EmptyResponse)));

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  \n"}}]}"#).unwrap();
        assert!(matches!(blank.into_text(), Err(LlmError::EmptyResponse)));

        let no_choices: ChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(no_choices.into_text(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn content_is_returned_verbatim() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":" tree \n"}}]}"#).unwrap();
        assert_eq!(resp.into_text().unwrap(), " tree \n");
    }
}
