//! HTTP client for the stackwright server.

use std::path::Path;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::{Value, json};
use stackwright_core::{ArtifactBundle, ProjectRequest};
use stackwright_core::suggest::Answer;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

pub struct ServerClient {
    base: String,
    http: reqwest::Client,
}

impl ServerClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn post(&self, path: &str, body: &impl serde::Serialize) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                error,
                details: Some(details),
            }) => bail!("{status}: {error} ({details})"),
            Ok(ErrorBody { error, .. }) => bail!("{status}: {error}"),
            Err(_) => bail!("{status}: {text}"),
        }
    }

    pub async fn bundle(&self, request: &ProjectRequest) -> Result<ArtifactBundle> {
        self.post("/api/generate-code", request)
            .await?
            .json()
            .await
            .context("Server sent an unreadable bundle")
    }

    /// Open the streamed full implementation.
    pub async fn stream(
        &self,
        request: &ProjectRequest,
    ) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        let resp = self.post("/api/generate-full-code", request).await?;
        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).context("Stream aborted"))
            .boxed())
    }

    pub async fn ask(&self, question: &str, code_context: &Value) -> Result<Answer> {
        let body = json!({ "question": question, "codeContext": code_context });
        self.post("/api/ask-code-question", &body)
            .await?
            .json()
            .await
            .context("Server sent an unreadable answer")
    }
}

/// Load a bundle previously saved by `stackwright bundle --output`.
pub fn read_bundle(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !value.is_object() {
        bail!("{} does not contain a bundle object", path.display());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = ServerClient::new("http://localhost:3000/");
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
    }

    #[test]
    fn saved_bundle_is_read_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r##"{{"readme_content": "# Todo"}}"##).unwrap();
        let bundle = read_bundle(file.path()).unwrap();
        assert_eq!(bundle["readme_content"], "# Todo");
    }

    #[test]
    fn non_object_bundle_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(read_bundle(file.path()).is_err());
        assert!(read_bundle(Path::new("/nonexistent/bundle.json")).is_err());
    }
}
