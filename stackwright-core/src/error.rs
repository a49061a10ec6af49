//! Error taxonomy shared by every bundle-producing operation.

use crate::llm::LlmError;

/// Coarse failure classes surfaced to callers.
///
/// Validation problems are reported before any upstream call is issued.
/// Everything else carries a diagnostic detail string and is never retried
/// by the core.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The caller's request failed a precondition.
    #[error("{0}")]
    InvalidInput(String),
    /// The text-generation call itself failed or returned nothing.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The call succeeded but its payload could not be decoded.
    #[error("malformed response from {stage} stage: {details}")]
    MalformedResponse { stage: String, details: String },
    /// A streamed relay failed after fragments were already delivered.
    #[error("stream aborted: {0}")]
    StreamAborted(String),
}

impl GenerateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GenerateError::InvalidInput(message.into())
    }

    pub fn malformed(stage: impl std::fmt::Display, details: impl std::fmt::Display) -> Self {
        GenerateError::MalformedResponse {
            stage: stage.to_string(),
            details: details.to_string(),
        }
    }

    /// True for failures the caller caused (4xx territory).
    pub fn is_client_error(&self) -> bool {
        matches!(self, GenerateError::InvalidInput(_))
    }

    /// Diagnostic detail suitable for the `details` field of an error body.
    pub fn details(&self) -> String {
        match self {
            GenerateError::InvalidInput(msg) => msg.clone(),
            GenerateError::UpstreamUnavailable(msg) => msg.clone(),
            GenerateError::MalformedResponse { stage, details } => format!("{stage}: {details}"),
            GenerateError::StreamAborted(msg) => msg.clone(),
        }
    }
}

impl From<LlmError> for GenerateError {
    fn from(e: LlmError) -> Self {
        GenerateError::UpstreamUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_errors_map_to_upstream_unavailable() {
        let err: GenerateError = LlmError::EmptyResponse.into();
        assert!(matches!(err, GenerateError::UpstreamUnavailable(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn invalid_input_displays_bare_message() {
        let err = GenerateError::invalid("Project idea is required");
        assert_eq!(err.to_string(), "Project idea is required");
        assert!(err.is_client_error());
    }

    #[test]
    fn malformed_details_name_the_stage() {
        let err = GenerateError::malformed("stack_suggestions", "expected value at line 1");
        assert_eq!(err.details(), "stack_suggestions: expected value at line 1");
    }
}
