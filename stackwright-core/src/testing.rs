//! Scripted [`TextGenerator`] for tests.
//!
//! Replies are chosen by the first matching rule, falling back to a default
//! reply. Every call is counted and its prompt recorded, so tests can assert
//! both on what was asked and on how often.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::llm::{FragmentStream, GenerationOptions, LlmError, Prompt, TextGenerator};
use crate::stage::Stage;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Empty,
    Fail(String),
}

impl Reply {
    fn resolve(&self) -> Result<String, LlmError> {
        match self {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Empty => Err(LlmError::EmptyResponse),
            Reply::Fail(message) => Err(LlmError::Status {
                status: 500,
                body: message.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    /// The system instructions are exactly this text.
    System(String),
    /// Either role contains this text.
    Contains(String),
}

impl Matcher {
    fn matches(&self, prompt: &Prompt) -> bool {
        match self {
            Matcher::System(system) => prompt.system == *system,
            Matcher::Contains(needle) => {
                prompt.system.contains(needle.as_str()) || prompt.user.contains(needle.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
enum StreamScript {
    Fragments {
        fragments: Vec<String>,
        failure: Option<String>,
    },
    Rejected(String),
}

/// A generator whose answers are fixed up front.
#[derive(Debug)]
pub struct ScriptedGenerator {
    rules: Vec<(Matcher, Reply)>,
    default: Reply,
    stream: StreamScript,
    latency: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
    options: Mutex<Vec<GenerationOptions>>,
}

impl ScriptedGenerator {
    /// Answers every prompt with `"ok"` and streams nothing.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: Reply::Text("ok".to_string()),
            stream: StreamScript::Fragments {
                fragments: Vec::new(),
                failure: None,
            },
            latency: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default = Reply::Text(text.into());
        self
    }

    /// Answer a bundle stage with `text`.
    pub fn on_stage(mut self, stage: Stage, text: impl Into<String>) -> Self {
        self.rules
            .push((Matcher::System(stage.instructions()), Reply::Text(text.into())));
        self
    }

    /// Fail a bundle stage with a non-success status.
    pub fn fail_stage(mut self, stage: Stage, message: impl Into<String>) -> Self {
        self.rules
            .push((Matcher::System(stage.instructions()), Reply::Fail(message.into())));
        self
    }

    /// Return no content for a bundle stage.
    pub fn empty_stage(mut self, stage: Stage) -> Self {
        self.rules
            .push((Matcher::System(stage.instructions()), Reply::Empty));
        self
    }

    /// Answer any prompt containing `needle` with `text`.
    pub fn on_prompt(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules
            .push((Matcher::Contains(needle.into()), Reply::Text(text.into())));
        self
    }

    /// Fail any prompt containing `needle`.
    pub fn fail_prompt(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((Matcher::Contains(needle.into()), Reply::Fail(message.into())));
        self
    }

    /// Return no content for any prompt containing `needle`.
    pub fn empty_prompt(mut self, needle: impl Into<String>) -> Self {
        self.rules
            .push((Matcher::Contains(needle.into()), Reply::Empty));
        self
    }

    /// Stream these fragments, then finish cleanly.
    pub fn with_stream<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream = StreamScript::Fragments {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
        };
        self
    }

    /// Stream these fragments, then fail with `message`.
    pub fn with_stream_failure<I, S>(mut self, fragments: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream = StreamScript::Fragments {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: Some(message.into()),
        };
        self
    }

    /// Refuse the streamed request itself.
    pub fn with_stream_rejected(mut self, message: impl Into<String>) -> Self {
        self.stream = StreamScript::Rejected(message.into());
        self
    }

    /// Delay every call by `latency` (tokio time, so pausable in tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made so far, streamed or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn options(&self) -> Vec<GenerationOptions> {
        self.options.lock().map(|o| o.clone()).unwrap_or_default()
    }

    async fn record(&self, prompt: &Prompt, options: &GenerationOptions) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        if let Ok(mut seen) = self.options.lock() {
            seen.push(options.clone());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        self.record(prompt, options).await;
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(prompt))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default)
            .resolve()
    }

    async fn generate_stream(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<FragmentStream, LlmError> {
        self.record(prompt, options).await;
        match &self.stream {
            StreamScript::Rejected(message) => Err(LlmError::Status {
                status: 429,
                body: message.clone(),
            }),
            StreamScript::Fragments { fragments, failure } => {
                let mut items: Vec<Result<String, LlmError>> =
                    fragments.iter().cloned().map(Ok).collect();
                if let Some(message) = failure {
                    items.push(Err(LlmError::Stream(message.clone())));
                }
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_matching_rule_wins_and_calls_are_counted() {
        let generator = ScriptedGenerator::new()
            .on_prompt("stack", "first")
            .on_prompt("stack", "second")
            .with_default("fallback");
        let options = GenerationOptions::new("m");

        let hit = generator
            .generate(&Prompt::user_only("suggest a stack"), &options)
            .await
            .unwrap();
        let miss = generator
            .generate(&Prompt::user_only("other"), &options)
            .await
            .unwrap();

        assert_eq!(hit, "first");
        assert_eq!(miss, "fallback");
        assert_eq!(generator.calls(), 2);
        assert_eq!(generator.prompts()[1].user, "other");
    }

    #[tokio::test]
    async fn stage_rules_match_on_instructions() {
        let generator = ScriptedGenerator::new().empty_stage(Stage::ReadmeContent);
        let prompt = Prompt::new(Stage::ReadmeContent.instructions(), "anything");
        let err = generator
            .generate(&prompt, &GenerationOptions::new("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
