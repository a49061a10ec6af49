//! HTTP API.
//!
//! Bundle and suggestion endpoints answer with JSON. The full-code endpoint
//! answers with a chunked `text/plain` body of raw fragments; if the upstream
//! fails mid-stream the body is cut off rather than closed cleanly.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stackwright_core::suggest::{
    Answer, AskRequest, FeatureRequest, FeatureSuggestions, StackRequest, StackSuggestions,
    StepSuggestions, StepsRequest, SubtaskList, SubtaskRequest,
};
use stackwright_core::{ArtifactBundle, ProjectRequest};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ApiError;
use crate::server::AppState;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

// ── Axum router ────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let origins: Vec<HeaderValue> = DEFAULT_ORIGINS
        .iter()
        .map(|o| o.to_string())
        .chain(state.config.cors_origins.iter().cloned())
        .filter_map(|o| o.parse().ok())
        .collect();

    Router::new()
        .route("/api/health", get(api_health))
        // Full scaffold
        .route("/api/generate-code", post(api_generate_code))
        .route("/api/generate-full-code", post(api_generate_full_code))
        .route("/api/ask-code-question", post(api_ask_code_question))
        // Wizard suggestions
        .route("/api/generate-stack", post(api_generate_stack))
        .route("/api/generate-features", post(api_generate_features))
        .route("/api/generate-steps", post(api_generate_steps))
        .route("/api/generate-subtasks", post(api_generate_subtasks))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// Parse a JSON body. Malformed JSON is a 400, like any other bad input.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.config.model.clone(),
    })
}

// ── Scaffold ───────────────────────────────────────────────────────────

async fn api_generate_code(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ArtifactBundle>, ApiError> {
    let request: ProjectRequest = parse_body(&body)?;
    let bundle = state
        .orchestrator
        .assemble_request(&request)
        .await
        .map_err(|e| ApiError::from_generate(e, "Failed to generate code"))?;
    Ok(Json(bundle))
}

async fn api_generate_full_code(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ProjectRequest = parse_body(&body)?;
    let relay = state
        .orchestrator
        .stream_request(&request)
        .await
        .map_err(|e| ApiError::from_generate(e, "Failed to generate code"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(relay),
    )
        .into_response())
}

async fn api_ask_code_question(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Answer>, ApiError> {
    let request: AskRequest = parse_body(&body)?;
    let answer = state
        .suggester
        .ask(&request)
        .await
        .map_err(|e| ApiError::from_generate(e, "Failed to answer question"))?;
    Ok(Json(answer))
}

// ── Wizard suggestions ─────────────────────────────────────────────────

async fn api_generate_stack(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StackSuggestions>, ApiError> {
    let request: StackRequest = parse_body(&body)?;
    state
        .suggester
        .stacks(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_generate(e, "Failed to generate stack suggestions"))
}

async fn api_generate_features(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<FeatureSuggestions>, ApiError> {
    let request: FeatureRequest = parse_body(&body)?;
    state
        .suggester
        .features(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_generate(e, "Failed to generate feature suggestions"))
}

async fn api_generate_steps(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StepSuggestions>, ApiError> {
    let request: StepsRequest = parse_body(&body)?;
    state
        .suggester
        .steps(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_generate(e, "Failed to generate implementation steps"))
}

async fn api_generate_subtasks(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SubtaskList>, ApiError> {
    let request: SubtaskRequest = parse_body(&body)?;
    state
        .suggester
        .subtasks(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_generate(e, "Failed to generate subtasks"))
}
