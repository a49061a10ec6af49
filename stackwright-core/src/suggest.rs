//! Wizard helpers: stack, feature, step and subtask suggestions, plus
//! free-form questions about a generated bundle.
//!
//! Suggestions are single JSON-mode calls decoded as JSON objects. Each
//! operation validates its own inputs before calling out.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerateError;
use crate::llm::{DEFAULT_MODEL, GenerationOptions, LlmError, Prompt, TextGenerator};
use crate::parser;
use crate::project::{
    FeatureCategory, ImplementationStep, StackChoice, lenient_category, lenient_steps,
    require_idea, require_stack,
};

pub const NO_ANSWER: &str = "No answer generated";

// ── Requests ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackRequest {
    #[serde(default)]
    pub project_idea: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    #[serde(default)]
    pub project_idea: Option<String>,
    #[serde(default)]
    pub stack: Option<Value>,
}

/// A title + description pair, as sent for steps and subtasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRef {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskRef {
    fn complete(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())?;
        Some((title, description))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsRequest {
    #[serde(default)]
    pub feature: Option<TaskRef>,
    #[serde(default)]
    pub stack: Option<Value>,
    #[serde(default)]
    pub project_idea: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskRequest {
    #[serde(default)]
    pub task: Option<TaskRef>,
    #[serde(default)]
    pub project_idea: Option<String>,
    #[serde(default)]
    pub stack: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    /// Usually a previously generated bundle; passed through as-is.
    #[serde(default)]
    pub code_context: Option<Value>,
}

// ── Responses ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSuggestion {
    #[serde(default)]
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub additional_tech: String,
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSuggestions {
    pub stacks: Vec<StackSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSuggestion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient_category",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<FeatureCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSuggestions {
    pub features: Vec<FeatureSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSuggestions {
    #[serde(deserialize_with = "lenient_steps")]
    pub steps: Vec<ImplementationStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub description: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskList {
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Deserialize)]
struct RawSubtask {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubtaskList {
    subtasks: Vec<RawSubtask>,
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl From<RawSubtask> for Subtask {
    fn from(raw: RawSubtask) -> Self {
        Subtask {
            title: or_default(raw.title, "Untitled Subtask"),
            description: or_default(raw.description, "No description provided"),
            info: or_default(raw.info, "No additional information available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

// ── Suggester ──────────────────────────────────────────────────────────

pub struct Suggester {
    generator: Arc<dyn TextGenerator>,
    model: String,
    temperature: f32,
}

impl Suggester {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn options(&self) -> GenerationOptions {
        GenerationOptions::new(&self.model).with_temperature(self.temperature)
    }

    async fn json_call<T: DeserializeOwned>(
        &self,
        label: &str,
        prompt: Prompt,
    ) -> Result<T, GenerateError> {
        let raw = self
            .generator
            .generate(&prompt, &self.options().json())
            .await
            .inspect_err(|e| tracing::warn!(call = label, error = %e, "Suggestion call failed"))?;
        let value = parser::decode_json(label, &raw)?;
        serde_json::from_value(value).map_err(|e| GenerateError::malformed(label, e))
    }

    /// Three candidate stacks for an idea.
    pub async fn stacks(&self, request: &StackRequest) -> Result<StackSuggestions, GenerateError> {
        let idea = require_idea(request.project_idea.as_deref())?;
        self.json_call("stack_suggestions", Prompt::user_only(stack_prompt(&idea)))
            .await
    }

    pub async fn features(
        &self,
        request: &FeatureRequest,
    ) -> Result<FeatureSuggestions, GenerateError> {
        let idea = require_idea(request.project_idea.as_deref())?;
        let stack = require_stack(request.stack.as_ref())?;
        self.json_call(
            "feature_suggestions",
            Prompt::user_only(feature_prompt(&idea, &stack)),
        )
        .await
    }

    /// Implementation steps for one feature.
    pub async fn steps(&self, request: &StepsRequest) -> Result<StepSuggestions, GenerateError> {
        let (title, description) = request
            .feature
            .as_ref()
            .and_then(TaskRef::complete)
            .ok_or_else(|| GenerateError::invalid("Feature title and description are required"))?;
        let idea = require_idea(request.project_idea.as_deref())?;
        let stack = require_stack(request.stack.as_ref())?;
        self.json_call(
            "implementation_steps",
            Prompt::user_only(steps_prompt(&idea, &stack, title, description)),
        )
        .await
    }

    /// Three to five subtasks for one task; missing fields get placeholders.
    pub async fn subtasks(&self, request: &SubtaskRequest) -> Result<SubtaskList, GenerateError> {
        let (title, description) = request
            .task
            .as_ref()
            .and_then(TaskRef::complete)
            .ok_or_else(|| {
                GenerateError::invalid(
                    "Missing required fields in task: title and description are required",
                )
            })?;
        let idea = request
            .project_idea
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .ok_or_else(|| GenerateError::invalid("Missing required field: projectIdea"))?;
        let stack = require_stack(request.stack.as_ref())
            .map_err(|_| GenerateError::invalid("Missing required field: stack.name"))?;

        let raw: RawSubtaskList = self
            .json_call(
                "subtasks",
                Prompt::user_only(subtask_prompt(idea, &stack, title, description)),
            )
            .await?;
        Ok(SubtaskList {
            subtasks: raw.subtasks.into_iter().map(Subtask::from).collect(),
        })
    }

    /// Answer a question about generated code. An empty answer is replaced
    /// with [`NO_ANSWER`].
    pub async fn ask(&self, request: &AskRequest) -> Result<Answer, GenerateError> {
        let missing = || GenerateError::invalid("Missing question or code context");
        let question = request
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(missing)?;
        let context = request
            .code_context
            .as_ref()
            .filter(|c| !c.is_null())
            .ok_or_else(missing)?;

        let context = serde_json::to_string_pretty(context)
            .map_err(|e| GenerateError::invalid(format!("Code context is malformed: {e}")))?;
        let prompt = Prompt::new(
            ASK_SYSTEM,
            format!(
                "Project Context:\n{context}\n\nQuestion: {question}\n\n\
                 Answer with clear section headers, syntax-highlighted code examples, \
                 important notes in blockquotes, and recommendations."
            ),
        );
        let answer = match self.generator.generate(&prompt, &self.options()).await {
            Ok(text) => parser::decode_text(&text, NO_ANSWER),
            Err(LlmError::EmptyResponse) => NO_ANSWER.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Question call failed");
                return Err(e.into());
            }
        };
        Ok(Answer { answer })
    }
}

// ── Prompts ────────────────────────────────────────────────────────────

fn stack_prompt(idea: &str) -> String {
    format!(
        "As an expert software architect, suggest 3 different technology stacks for this \
project idea: \"{idea}\"\n\n\
Weigh project complexity, development efficiency, scalability, performance, a beginner to \
intermediate team, community support and cost.\n\n\
Respond with a JSON object of this shape, marking exactly one stack as recommended:\n\
{{\"stacks\": [{{\"id\": number, \"name\": string, \"framework\": string, \
\"additionalTech\": string, \"storage\": string, \"description\": string, \
\"recommended\": boolean}}]}}"
    )
}

fn feature_prompt(idea: &str, stack: &StackChoice) -> String {
    format!(
        "As an expert software architect, suggest features for this project.\n\n\
Project Idea: \"{idea}\"\nTech Stack: {}\n\n\
Cover core functionality, user experience, technical requirements, security and \
performance.\n\n\
Respond with a JSON object of this shape:\n\
{{\"features\": [{{\"title\": string, \"description\": string, \
\"category\": \"core\" | \"ux\" | \"technical\" | \"security\"}}]}}",
        stack.label()
    )
}

fn steps_prompt(idea: &str, stack: &StackChoice, title: &str, description: &str) -> String {
    format!(
        "As an expert software developer, give detailed implementation steps for this \
feature.\n\n\
Project: \"{idea}\"\nTech Stack: {}\nFeature: \"{title}\"\nFeature Description: \
\"{description}\"\n\n\
Include setup, error handling, security and performance considerations.\n\n\
Respond with a JSON object of this shape:\n\
{{\"steps\": [{{\"title\": string, \"description\": string, \"code_snippet\": string \
(optional), \"type\": \"setup\" | \"implementation\" | \"testing\" | \"optimization\"}}]}}",
        stack.label()
    )
}

fn subtask_prompt(idea: &str, stack: &StackChoice, title: &str, description: &str) -> String {
    let framework = stack
        .framework
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or("No framework specified");
    format!(
        "As an expert software developer, break this task into 3-5 subtasks in a logical \
order, including setup, testing and error handling.\n\n\
Project Idea: \"{idea}\"\nTech Stack: {} ({framework})\nTask: \"{title}\"\n\
Task Description: \"{description}\"\n\n\
Respond with a JSON object of this shape:\n\
{{\"subtasks\": [{{\"title\": string, \"description\": string, \"info\": string}}]}}",
        stack.name
    )
}

const ASK_SYSTEM: &str = "You are an expert software developer explaining code. Use markdown: \
inline backticks for identifiers and paths, fenced code blocks with language tags, bold for \
key concepts, blockquotes for important notes. Start with a title and a short overview, then \
examples, then best practices.";
