//! stackwright-core: turns a short project description into a typed
//! software scaffold.
//!
//! - Bundle mode: seven independent generation stages run concurrently and
//!   their decoded results are assembled into an [`ArtifactBundle`].
//! - Stream mode: one long generation is relayed fragment by fragment.
//! - Wizard helpers suggest stacks, features, steps and subtasks.

pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod project;
pub mod relay;
pub mod sse;
pub mod stage;
pub mod suggest;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::GenerateError;
pub use llm::{GenerationOptions, LlmError, OpenAiClient, Prompt, TextGenerator};
pub use orchestrator::{ArtifactBundle, Orchestrator, OrchestratorConfig};
pub use project::{ProjectRequest, ProjectSpec};
pub use relay::{FragmentRelay, RelayState};
