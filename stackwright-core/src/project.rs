//! Project description supplied by the caller.
//!
//! A [`ProjectSpec`] is only ever built by [`ProjectRequest::validate`], so
//! holding one means the idea, stack name and feature list already passed
//! their preconditions. The caller owns it and threads it through each call;
//! nothing in the core keeps it between runs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::GenerateError;

/// The technology stack chosen for the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackChoice {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_tech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

impl StackChoice {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: None,
            additional_tech: None,
            storage: None,
        }
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    /// `name (framework)` when a framework is set, else just the name.
    pub fn label(&self) -> String {
        match self.framework.as_deref().filter(|f| !f.is_empty()) {
            Some(fw) => format!("{} ({fw})", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Core,
    Ux,
    Technical,
    Security,
}

impl FeatureCategory {
    /// Case-insensitive match on the category name. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "core" => Some(FeatureCategory::Core),
            "ux" => Some(FeatureCategory::Ux),
            "technical" => Some(FeatureCategory::Technical),
            "security" => Some(FeatureCategory::Security),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureCategory::Core => write!(f, "core"),
            FeatureCategory::Ux => write!(f, "ux"),
            FeatureCategory::Technical => write!(f, "technical"),
            FeatureCategory::Security => write!(f, "security"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Setup,
    #[default]
    Implementation,
    Testing,
    Optimization,
}

impl StepKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "setup" => Some(StepKind::Setup),
            "implementation" => Some(StepKind::Implementation),
            "testing" => Some(StepKind::Testing),
            "optimization" => Some(StepKind::Optimization),
            _ => None,
        }
    }
}

/// `category` as sent by clients and models: any casing, unknown values dropped.
pub(crate) fn lenient_category<'de, D>(de: D) -> Result<Option<FeatureCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(FeatureCategory::parse))
}

fn lenient_kind<'de, D>(de: D) -> Result<StepKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(StepKind::parse)
        .unwrap_or_default())
}

pub(crate) fn lenient_steps<'de, D>(de: D) -> Result<Vec<ImplementationStep>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(match raw {
        Some(Value::Array(items)) => items.iter().filter_map(ImplementationStep::from_loose).collect(),
        _ => Vec::new(),
    })
}

fn loose_str(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One step of a feature's implementation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        alias = "code_snippet",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_snippet: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: StepKind,
}

impl ImplementationStep {
    /// Build a step from whatever a client or model sent. A bare string
    /// becomes the step title; anything other than a string or object is
    /// skipped.
    pub fn from_loose(item: &Value) -> Option<Self> {
        match item {
            Value::String(title) if !title.trim().is_empty() => Some(Self {
                title: title.trim().to_string(),
                description: String::new(),
                code_snippet: None,
                kind: StepKind::default(),
            }),
            Value::Object(_) => Some(Self {
                title: loose_str(item, "title").unwrap_or_default(),
                description: loose_str(item, "description").unwrap_or_default(),
                code_snippet: ["codeSnippet", "code_snippet"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(Value::as_str))
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
                kind: loose_str(item, "type")
                    .as_deref()
                    .and_then(StepKind::parse)
                    .unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub title: String,
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient_category",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<FeatureCategory>,
    #[serde(default, deserialize_with = "lenient_steps")]
    pub steps: Vec<ImplementationStep>,
}

impl Feature {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: None,
            steps: Vec::new(),
        }
    }
}

/// A validated project description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(rename = "projectIdea")]
    idea: String,
    stack: StackChoice,
    features: Vec<Feature>,
}

impl ProjectSpec {
    pub fn idea(&self) -> &str {
        &self.idea
    }

    pub fn stack(&self) -> &StackChoice {
        &self.stack
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }
}

/// Raw inbound request body, loosely typed so every malformed field gets
/// its own message instead of a generic deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(default)]
    pub project_idea: Option<Value>,
    #[serde(default)]
    pub stack: Option<Value>,
    #[serde(default)]
    pub features: Option<Value>,
}

impl ProjectRequest {
    pub fn new(idea: &str, stack: &StackChoice, features: &[Feature]) -> Self {
        Self {
            project_idea: Some(Value::from(idea)),
            stack: serde_json::to_value(stack).ok(),
            features: serde_json::to_value(features).ok(),
        }
    }

    /// Check preconditions in order and report the first violation.
    pub fn validate(&self) -> Result<ProjectSpec, GenerateError> {
        let idea = require_idea(self.project_idea.as_ref().and_then(Value::as_str))?;
        let stack = require_stack(self.stack.as_ref())?;

        let items = match &self.features {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(GenerateError::invalid("At least one feature is required")),
        };
        let features = items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_feature(i + 1, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProjectSpec {
            idea,
            stack,
            features,
        })
    }
}

/// The idea must be present and non-blank.
pub(crate) fn require_idea(idea: Option<&str>) -> Result<String, GenerateError> {
    match idea.map(str::trim) {
        Some(idea) if !idea.is_empty() => Ok(idea.to_string()),
        _ => Err(GenerateError::invalid("Project idea is required")),
    }
}

/// The stack must be an object with a non-blank `name`.
pub(crate) fn require_stack(stack: Option<&Value>) -> Result<StackChoice, GenerateError> {
    let stack = stack.filter(|v| v.is_object());
    let name = stack
        .and_then(|s| loose_str(s, "name"))
        .ok_or_else(|| GenerateError::invalid("Tech stack with name is required"))?;
    let optional = |key: &str| stack.and_then(|s| loose_str(s, key));
    Ok(StackChoice {
        name,
        framework: optional("framework"),
        additional_tech: optional("additionalTech"),
        storage: optional("storage"),
    })
}

/// Only the title, description and steps array are required. Category and
/// step contents are taken as far as they make sense.
fn parse_feature(position: usize, item: &Value) -> Result<Feature, GenerateError> {
    if !item.is_object() {
        return Err(GenerateError::invalid(format!(
            "Feature {position} must be an object"
        )));
    }
    let title = loose_str(item, "title").ok_or_else(|| {
        GenerateError::invalid(format!("Feature {position} must have a title"))
    })?;
    let description = loose_str(item, "description").ok_or_else(|| {
        GenerateError::invalid(format!("Feature {position} must have a description"))
    })?;
    let Some(steps) = item.get("steps").and_then(Value::as_array) else {
        return Err(GenerateError::invalid(format!(
            "Feature {position} must have a steps array"
        )));
    };
    Ok(Feature {
        title,
        description,
        category: item
            .get("category")
            .and_then(Value::as_str)
            .and_then(FeatureCategory::parse),
        steps: steps.iter().filter_map(ImplementationStep::from_loose).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> ProjectRequest {
        serde_json::from_value(body).unwrap()
    }

    fn message(req: &ProjectRequest) -> String {
        match req.validate() {
            Err(GenerateError::InvalidInput(msg)) => msg,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    fn valid_body() -> Value {
        json!({
            "projectIdea": "A recipe sharing site",
            "stack": { "name": "MERN", "framework": "Express", "additionalTech": "Redis" },
            "features": [{
                "title": "Auth",
                "description": "Email login",
                "category": "security",
                "steps": [{ "title": "Schema", "description": "User model", "code_snippet": "x", "type": "setup" }]
            }]
        })
    }

    #[test]
    fn valid_request_becomes_spec() {
        let spec = request(valid_body()).validate().unwrap();
        assert_eq!(spec.idea(), "A recipe sharing site");
        assert_eq!(spec.stack().label(), "MERN (Express)");
        assert_eq!(spec.stack().additional_tech.as_deref(), Some("Redis"));
        let feature = &spec.features()[0];
        assert_eq!(feature.category, Some(FeatureCategory::Security));
        assert_eq!(feature.steps[0].code_snippet.as_deref(), Some("x"));
        assert_eq!(feature.steps[0].kind, StepKind::Setup);
    }

    #[test]
    fn first_violation_wins() {
        let req = request(json!({ "projectIdea": "", "features": [] }));
        assert_eq!(message(&req), "Project idea is required");
    }

    #[test]
    fn stack_needs_a_name() {
        let mut body = valid_body();
        body["stack"] = json!({ "framework": "Express" });
        assert_eq!(message(&request(body)), "Tech stack with name is required");

        let mut body = valid_body();
        body["stack"] = json!("MERN");
        assert_eq!(message(&request(body)), "Tech stack with name is required");
    }

    #[test]
    fn features_must_be_non_empty_list() {
        for features in [json!([]), json!({}), Value::Null] {
            let mut body = valid_body();
            body["features"] = features;
            assert_eq!(message(&request(body)), "At least one feature is required");
        }
    }

    #[test]
    fn each_feature_field_has_its_own_message() {
        let cases = [
            (json!({ "description": "d", "steps": [] }), "Feature 1 must have a title"),
            (json!({ "title": "t", "steps": [] }), "Feature 1 must have a description"),
            (json!({ "title": "t", "description": "d" }), "Feature 1 must have a steps array"),
            (
                json!({ "title": "t", "description": "d", "steps": "none" }),
                "Feature 1 must have a steps array",
            ),
        ];
        for (feature, expected) in cases {
            let mut body = valid_body();
            body["features"] = json!([feature]);
            assert_eq!(message(&request(body)), expected);
        }
    }

    #[test]
    fn later_features_are_numbered() {
        let mut body = valid_body();
        body["features"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "title": " ", "description": "d", "steps": [] }));
        assert_eq!(message(&request(body)), "Feature 2 must have a title");
    }

    #[test]
    fn empty_steps_list_is_accepted() {
        let mut body = valid_body();
        body["features"] = json!([{ "title": "t", "description": "d", "steps": [] }]);
        let spec = request(body).validate().unwrap();
        assert!(spec.features()[0].steps.is_empty());
    }

    #[test]
    fn non_string_idea_gets_the_idea_message() {
        let mut body = valid_body();
        body["projectIdea"] = json!(123);
        assert_eq!(message(&request(body)), "Project idea is required");
    }

    #[test]
    fn category_is_read_leniently() {
        let cases = [
            (json!("Core"), Some(FeatureCategory::Core)),
            (json!(" UX "), Some(FeatureCategory::Ux)),
            (json!("performance"), None),
            (json!(7), None),
        ];
        for (category, expected) in cases {
            let mut body = valid_body();
            body["features"][0]["category"] = category;
            let spec = request(body).validate().unwrap();
            assert_eq!(spec.features()[0].category, expected);
        }
    }

    #[test]
    fn loose_steps_are_kept_or_skipped() {
        let mut body = valid_body();
        body["features"][0]["steps"] = json!([
            { "title": "Deploy", "description": "Ship it", "type": "deployment" },
            "write the model",
            42,
            { "title": "Bench", "type": "Optimization", "codeSnippet": "cargo bench" }
        ]);
        let spec = request(body).validate().unwrap();
        let steps = &spec.features()[0].steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].kind, StepKind::Implementation);
        assert_eq!(steps[1].title, "write the model");
        assert!(steps[1].description.is_empty());
        assert_eq!(steps[2].kind, StepKind::Optimization);
        assert_eq!(steps[2].code_snippet.as_deref(), Some("cargo bench"));
    }

    #[test]
    fn stack_extras_of_the_wrong_type_are_ignored() {
        let mut body = valid_body();
        body["stack"] = json!({ "name": "MERN", "framework": 5, "storage": "Mongo" });
        let spec = request(body).validate().unwrap();
        assert_eq!(spec.stack().label(), "MERN");
        assert_eq!(spec.stack().storage.as_deref(), Some("Mongo"));
    }

    #[test]
    fn serde_decoding_is_lenient_too() {
        let feature: Feature = serde_json::from_value(json!({
            "title": "Cache",
            "description": "Hot paths",
            "category": "performance",
            "steps": ["profile", { "title": "Add Redis", "type": "deployment" }]
        }))
        .unwrap();
        assert_eq!(feature.category, None);
        assert_eq!(feature.steps.len(), 2);
        assert_eq!(feature.steps[1].kind, StepKind::Implementation);
    }

    #[test]
    fn builder_round_trips_through_validation() {
        let feature = Feature::new("Search", "Full-text search");
        let req = ProjectRequest::new("Notes app", &StackChoice::named("Django"), &[feature]);
        let spec = req.validate().unwrap();
        assert_eq!(spec.stack().label(), "Django");
        assert_eq!(spec.features()[0].title, "Search");
    }
}
