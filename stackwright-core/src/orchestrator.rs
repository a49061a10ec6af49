//! Fan-out orchestrator: one validated project in, one seven-part bundle out.
//!
//! Every stage call is issued at once and awaited together on the calling
//! task. The first failure cancels the outstanding calls and fails the whole
//! bundle; there is no partial result. Stream mode issues a single call and
//! hands back a [`FragmentRelay`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GenerateError;
use crate::llm::{DEFAULT_MODEL, GenerationOptions, LlmError, TextGenerator};
use crate::parser::{self, Artifact, FileMap};
use crate::project::{ProjectRequest, ProjectSpec};
use crate::relay::FragmentRelay;
use crate::stage::{self, ResultKind, Stage};

/// Sampling settings for bundle and stream calls.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    /// Applied to every bundle stage.
    pub temperature: f32,
    /// Completion token limit for the streamed full implementation.
    pub stream_max_tokens: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            stream_max_tokens: 16_384,
        }
    }
}

// ── Bundle ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryTree {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub requirements_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupInstructions {
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeNotes {
    pub features: Vec<String>,
}

/// The full scaffold. Serializes to exactly one key per [`Stage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub project_structure: DirectoryTree,
    pub dependencies_configuration: DependencyManifest,
    pub setup_instructions: SetupInstructions,
    pub implementation_steps: ImplementationPlan,
    pub main_project_files: FileMap,
    pub additional_features_best_practices: PracticeNotes,
    pub readme_content: String,
}

fn into_text(stage: Stage, artifact: Artifact) -> Result<String, GenerateError> {
    match artifact {
        Artifact::Text(text) => Ok(text),
        _ => Err(GenerateError::malformed(stage, "expected free text")),
    }
}

fn into_lines(stage: Stage, artifact: Artifact) -> Result<Vec<String>, GenerateError> {
    match artifact {
        Artifact::Lines(lines) => Ok(lines),
        _ => Err(GenerateError::malformed(stage, "expected a line list")),
    }
}

fn into_files(stage: Stage, artifact: Artifact) -> Result<FileMap, GenerateError> {
    match artifact {
        Artifact::Files(files) => Ok(files),
        _ => Err(GenerateError::malformed(stage, "expected a file map")),
    }
}

// ── Orchestrator ───────────────────────────────────────────────────────

pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate a raw request, then assemble its bundle.
    ///
    /// An invalid request fails before any upstream call is issued.
    pub async fn assemble_request(
        &self,
        request: &ProjectRequest,
    ) -> Result<ArtifactBundle, GenerateError> {
        let spec = request.validate()?;
        self.assemble(&spec).await
    }

    /// Run all seven stages concurrently and collect the bundle.
    pub async fn assemble(&self, spec: &ProjectSpec) -> Result<ArtifactBundle, GenerateError> {
        tracing::info!(stack = %spec.stack().name, features = spec.features().len(), "Assembling bundle");
        let options = GenerationOptions::new(&self.config.model)
            .with_temperature(self.config.temperature);

        let (structure, dependencies, setup, plan, files, practices, readme) = tokio::try_join!(
            self.run_stage(Stage::ProjectStructure, spec, &options),
            self.run_stage(Stage::DependenciesConfiguration, spec, &options),
            self.run_stage(Stage::SetupInstructions, spec, &options),
            self.run_stage(Stage::ImplementationSteps, spec, &options),
            self.run_stage(Stage::MainProjectFiles, spec, &options),
            self.run_stage(Stage::AdditionalFeatures, spec, &options),
            self.run_stage(Stage::ReadmeContent, spec, &options),
        )?;

        let bundle = ArtifactBundle {
            project_structure: DirectoryTree {
                directory: into_text(Stage::ProjectStructure, structure)?,
            },
            dependencies_configuration: DependencyManifest {
                requirements_file: into_text(Stage::DependenciesConfiguration, dependencies)?,
            },
            setup_instructions: SetupInstructions {
                instructions: into_lines(Stage::SetupInstructions, setup)?,
            },
            implementation_steps: ImplementationPlan {
                steps: into_lines(Stage::ImplementationSteps, plan)?,
            },
            main_project_files: into_files(Stage::MainProjectFiles, files)?,
            additional_features_best_practices: PracticeNotes {
                features: into_lines(Stage::AdditionalFeatures, practices)?,
            },
            readme_content: into_text(Stage::ReadmeContent, readme)?,
        };
        tracing::info!(files = bundle.main_project_files.len(), "Bundle assembled");
        Ok(bundle)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        spec: &ProjectSpec,
        options: &GenerationOptions,
    ) -> Result<Artifact, GenerateError> {
        let prompt = stage.prompt(spec);
        let raw = match self.generator.generate(&prompt, options).await {
            Ok(raw) => raw,
            // Free-text stages fall back to their sentinel instead of failing.
            Err(LlmError::EmptyResponse) if stage.kind() == ResultKind::FreeText => {
                tracing::debug!(stage = %stage, "Empty content, using fallback");
                String::new()
            }
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Stage failed");
                return Err(e.into());
            }
        };
        tracing::debug!(stage = %stage, bytes = raw.len(), "Stage complete");
        parser::decode_stage(stage, &raw)
    }

    /// Validate a raw request, then open the streamed full implementation.
    pub async fn stream_request(
        &self,
        request: &ProjectRequest,
    ) -> Result<FragmentRelay, GenerateError> {
        let spec = request.validate()?;
        self.stream(&spec).await
    }

    /// Open the streamed full implementation as a single call.
    ///
    /// Returns once the upstream has accepted the request; fragments are
    /// pulled from the relay afterwards.
    pub async fn stream(&self, spec: &ProjectSpec) -> Result<FragmentRelay, GenerateError> {
        tracing::info!(stack = %spec.stack().name, "Opening full-code stream");
        let options = GenerationOptions::new(&self.config.model)
            .with_max_tokens(self.config.stream_max_tokens);
        let mut relay = FragmentRelay::new();
        relay
            .start(self.generator.as_ref(), &stage::full_code_prompt(spec), &options)
            .await?;
        Ok(relay)
    }
}
