//! Project description flags shared by `bundle` and `stream`.

use clap::Args;
use stackwright_core::project::{Feature, ProjectRequest, StackChoice};

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Short description of the project
    #[arg(long)]
    pub idea: String,

    /// Tech stack name, e.g. "MERN"
    #[arg(long)]
    pub stack: String,

    /// Main framework of the stack
    #[arg(long)]
    pub framework: Option<String>,

    /// Extra libraries or tools
    #[arg(long)]
    pub additional_tech: Option<String>,

    /// Data storage
    #[arg(long)]
    pub storage: Option<String>,

    /// Feature as "Title: description" (repeatable)
    #[arg(long = "feature", value_parser = parse_feature, required = true)]
    pub features: Vec<Feature>,
}

impl ProjectArgs {
    pub fn stack_choice(&self) -> StackChoice {
        StackChoice {
            name: self.stack.clone(),
            framework: self.framework.clone(),
            additional_tech: self.additional_tech.clone(),
            storage: self.storage.clone(),
        }
    }

    pub fn to_request(&self) -> ProjectRequest {
        ProjectRequest::new(&self.idea, &self.stack_choice(), &self.features)
    }
}

/// Parse `"Title: description"` into a feature with no steps.
pub fn parse_feature(raw: &str) -> Result<Feature, String> {
    let (title, description) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Title: description\", got {raw:?}"))?;
    let (title, description) = (title.trim(), description.trim());
    if title.is_empty() || description.is_empty() {
        return Err(format!("feature title and description must be non-empty: {raw:?}"));
    }
    Ok(Feature::new(title, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_splits_on_first_colon() {
        let feature = parse_feature("Auth: login with email: and password").unwrap();
        assert_eq!(feature.title, "Auth");
        assert_eq!(feature.description, "login with email: and password");
        assert!(feature.steps.is_empty());
    }

    #[test]
    fn feature_needs_both_halves() {
        assert!(parse_feature("Auth").is_err());
        assert!(parse_feature(" : desc").is_err());
        assert!(parse_feature("Auth:   ").is_err());
    }

    #[test]
    fn flags_become_a_valid_request() {
        let args = ProjectArgs {
            idea: "Todo app".to_string(),
            stack: "MERN".to_string(),
            framework: Some("Express".to_string()),
            additional_tech: None,
            storage: Some("MongoDB".to_string()),
            features: vec![Feature::new("Lists", "Create lists")],
        };
        let spec = args.to_request().validate().unwrap();
        assert_eq!(spec.stack().label(), "MERN (Express)");
        assert_eq!(spec.stack().storage.as_deref(), Some("MongoDB"));
        assert_eq!(spec.features().len(), 1);
    }
}
