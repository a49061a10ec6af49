//! The seven generation stages of a full bundle.
//!
//! Each stage is a pure mapping from a [`ProjectSpec`] to a [`Prompt`],
//! tagged with the [`ResultKind`] that selects its decoder. No stage reads
//! another stage's output, which is what lets the orchestrator run them all
//! at once.

use std::fmt::Write as _;

use crate::llm::Prompt;
use crate::project::ProjectSpec;

/// Literal delimiter between file records in the source-files stage.
pub const FILE_MARKER: &str = "---FILENAME---";

/// Decoder applied to a stage's raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    FreeText,
    LineList,
    JsonObject,
    FileMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    ProjectStructure,
    DependenciesConfiguration,
    SetupInstructions,
    ImplementationSteps,
    MainProjectFiles,
    AdditionalFeatures,
    ReadmeContent,
}

impl Stage {
    /// Every stage of a full bundle, in bundle order.
    pub const ALL: [Stage; 7] = [
        Stage::ProjectStructure,
        Stage::DependenciesConfiguration,
        Stage::SetupInstructions,
        Stage::ImplementationSteps,
        Stage::MainProjectFiles,
        Stage::AdditionalFeatures,
        Stage::ReadmeContent,
    ];

    /// Bundle key for this stage's result.
    pub fn key(self) -> &'static str {
        match self {
            Stage::ProjectStructure => "project_structure",
            Stage::DependenciesConfiguration => "dependencies_configuration",
            Stage::SetupInstructions => "setup_instructions",
            Stage::ImplementationSteps => "implementation_steps",
            Stage::MainProjectFiles => "main_project_files",
            Stage::AdditionalFeatures => "additional_features_best_practices",
            Stage::ReadmeContent => "readme_content",
        }
    }

    pub fn kind(self) -> ResultKind {
        match self {
            Stage::ProjectStructure | Stage::DependenciesConfiguration | Stage::ReadmeContent => {
                ResultKind::FreeText
            }
            Stage::SetupInstructions | Stage::ImplementationSteps | Stage::AdditionalFeatures => {
                ResultKind::LineList
            }
            Stage::MainProjectFiles => ResultKind::FileMap,
        }
    }

    /// Text used when a free-text stage comes back empty.
    pub fn fallback(self) -> &'static str {
        match self {
            Stage::ProjectStructure => "// No project structure generated",
            Stage::DependenciesConfiguration => "// No dependencies generated",
            Stage::ReadmeContent => "No README generated",
            _ => crate::parser::NO_OUTPUT,
        }
    }

    /// System-role instructions for this stage.
    pub fn instructions(self) -> String {
        match self {
            Stage::ProjectStructure => STRUCTURE_SYSTEM.to_string(),
            Stage::DependenciesConfiguration => DEPENDENCIES_SYSTEM.to_string(),
            Stage::SetupInstructions => SETUP_SYSTEM.to_string(),
            Stage::ImplementationSteps => PLAN_SYSTEM.to_string(),
            Stage::MainProjectFiles => files_system(),
            Stage::AdditionalFeatures => PRACTICES_SYSTEM.to_string(),
            Stage::ReadmeContent => README_SYSTEM.to_string(),
        }
    }

    pub fn prompt(self, spec: &ProjectSpec) -> Prompt {
        let context = context_block(spec, self.uses_features());
        let user = match self {
            Stage::ProjectStructure => {
                format!("Create a detailed directory structure for this project:\n{context}")
            }
            Stage::DependenciesConfiguration => {
                format!("Create a dependencies file for this project:\n{context}")
            }
            Stage::SetupInstructions => {
                format!("Create setup instructions for this project:\n{context}")
            }
            Stage::ImplementationSteps => format!(
                "Create implementation steps for this project:\n{context}\n\
                 Cover, in order: initial setup, core implementation, \
                 feature implementation, and a final optimization and deployment phase."
            ),
            Stage::MainProjectFiles => format!("Generate the core project files for:\n{context}"),
            Stage::AdditionalFeatures => {
                format!("Document the features and best practices for this project:\n{context}")
            }
            Stage::ReadmeContent => format!("Create a README.md for this project:\n{context}"),
        };
        Prompt::new(self.instructions(), user)
    }

    fn uses_features(self) -> bool {
        !matches!(
            self,
            Stage::ProjectStructure | Stage::DependenciesConfiguration | Stage::SetupInstructions
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Shared project summary interpolated into every stage prompt.
pub(crate) fn context_block(spec: &ProjectSpec, with_features: bool) -> String {
    let stack = spec.stack();
    let mut out = format!("Project: {}\nTech Stack: {}\n", spec.idea(), stack.name);
    let optional = [
        ("Framework", &stack.framework),
        ("Additional Tech", &stack.additional_tech),
        ("Storage", &stack.storage),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    if with_features {
        out.push_str("\nFeatures:\n");
        for feature in spec.features() {
            let _ = writeln!(out, "- {}: {}", feature.title, feature.description);
        }
    }
    out
}

/// Single-call prompt for the streamed full implementation.
///
/// Unlike the bundle stages this one carries every feature's category and
/// implementation steps.
pub fn full_code_prompt(spec: &ProjectSpec) -> Prompt {
    let mut user = format!(
        "Generate complete code for the following project:\n\n\
         Project Description:\n{}\n\nTech Stack:\n{}\n\nFeatures:\n",
        spec.idea(),
        spec.stack().label()
    );
    for feature in spec.features() {
        let _ = writeln!(user, "- {}", feature.title);
        let _ = writeln!(user, "  Description: {}", feature.description);
        if let Some(category) = feature.category {
            let _ = writeln!(user, "  Category: {category}");
        }
        if !feature.steps.is_empty() {
            user.push_str("  Implementation Steps:\n");
            for step in &feature.steps {
                let _ = writeln!(user, "    * {}: {}", step.title, step.description);
            }
        }
    }
    user.push_str(
        "\nProvide a complete implementation including the project structure, every \
         necessary file, dependencies and configuration, all features, clear comments and \
         setup instructions. Use modern coding standards.",
    );
    Prompt::new(FULL_CODE_SYSTEM, user)
}

const FULL_CODE_SYSTEM: &str = "You are an expert software developer who writes clean, \
efficient, and well-documented code. Provide complete, working implementations.";

const STRUCTURE_SYSTEM: &str = "You are a software architect. Produce a clean, conventional \
directory tree for the given tech stack. Use indentation or │ ├ └ characters. \
Output only the tree, with no explanations and no markdown.";

const DEPENDENCIES_SYSTEM: &str = "You are a dependency management expert. Produce the \
dependency manifest for the project (for example package.json or requirements.txt) with \
pinned versions, covering production and development dependencies. Output only the file \
contents, with no explanations and no markdown.";

const SETUP_SYSTEM: &str = "You are a DevOps engineer. Produce clear setup instructions as a \
numbered list, one step per line. Output only the steps, with no explanations and no markdown.";

const PLAN_SYSTEM: &str = "You are a technical project manager. Produce a detailed, ordered \
implementation plan, one step per line.";

const PRACTICES_SYSTEM: &str = "You are a software architect. List the implemented features \
and the best practices the project follows as bullet points, one per line. Output only the \
bullet points, with no explanations and no markdown.";

const README_SYSTEM: &str = "You are a technical writer. Write a complete README.md in valid \
markdown with these sections in order: title, description, features, prerequisites, \
installation, usage, API documentation (if applicable), development setup, testing, \
deployment, contributing, license. Leave a blank line between sections and output only \
the README.";

fn files_system() -> String {
    format!(
        "You are an expert software developer. Generate production-ready source files with \
error handling, logging and documentation.\n\
Start every file with a line containing only {FILE_MARKER}, then the file path on the next \
line, then the file contents until the next marker.\n\
Do not wrap code in quotes, backticks or markdown code blocks, and do not add explanations.\n\n\
Example:\n\n\
{FILE_MARKER}\nsrc/index.js\nimport App from './App';\n\n\
{FILE_MARKER}\nsrc/App.js\nexport default function App() {{ return null; }}\n"
    )
}
