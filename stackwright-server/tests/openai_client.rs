//! `OpenAiClient` against a fake chat completions upstream.

use std::time::Duration;

use axum::Router;
use axum::extract::Json;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use futures::StreamExt;
use serde_json::{Value, json};
use stackwright_core::llm::{GenerationOptions, LlmError, OpenAiClient, Prompt, TextGenerator};

fn completion(content: Value) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

fn sse_delta(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "delta": { "content": text } }] })
    )
}

/// Replies with the auth header, model and message roles it received.
async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let roles: Vec<&str> = body["messages"]
        .as_array()
        .map(|m| m.iter().filter_map(|m| m["role"].as_str()).collect())
        .unwrap_or_default();
    let summary = format!(
        "{auth}|{}|{}|{}",
        body["model"].as_str().unwrap_or(""),
        roles.join(","),
        body["response_format"]["type"].as_str().unwrap_or("text")
    );
    Json(completion(json!(summary)))
}

async fn empty() -> Json<Value> {
    Json(completion(Value::Null))
}

async fn limited() -> impl IntoResponse {
    (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
}

async fn stream_ok() -> impl IntoResponse {
    let body = sse_delta("fn ") + &sse_delta("main") + &sse_delta("() {}") + "data: [DONE]\n\n";
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn stream_truncated() -> impl IntoResponse {
    let body = sse_delta("partial");
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(completion(json!("late")))
}

/// Start the fake upstream. Returns its base URL.
async fn start_upstream() -> String {
    let app = Router::new()
        .route("/echo", post(echo))
        .route("/empty", post(empty))
        .route("/limited", post(limited))
        .route("/stream", post(stream_ok))
        .route("/truncated", post(stream_truncated))
        .route("/slow", post(slow));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client(base: &str, path: &str) -> OpenAiClient {
    OpenAiClient::new("sk-test".to_string()).with_endpoint(&format!("{base}{path}"))
}

#[tokio::test]
async fn completion_sends_auth_model_and_roles() {
    let base = start_upstream().await;
    let text = client(&base, "/echo")
        .generate(
            &Prompt::new("be terse", "hello"),
            &GenerationOptions::new("gpt-4o").json(),
        )
        .await
        .unwrap();
    assert_eq!(text, "Bearer sk-test|gpt-4o|system,user|json_object");
}

#[tokio::test]
async fn user_only_prompt_sends_one_message() {
    let base = start_upstream().await;
    let text = client(&base, "/echo")
        .generate(&Prompt::user_only("hello"), &GenerationOptions::new("m"))
        .await
        .unwrap();
    assert_eq!(text, "Bearer sk-test|m|user|text");
}

#[tokio::test]
async fn null_content_is_empty_response() {
    let base = start_upstream().await;
    let err = client(&base, "/empty")
        .generate(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[tokio::test]
async fn non_success_status_is_distinguishable() {
    let base = start_upstream().await;
    let err = client(&base, "/limited")
        .generate(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await
        .unwrap_err();
    match err {
        LlmError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limit exceeded");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let base = start_upstream().await;
    let err = client(&base, "/slow")
        .with_request_timeout(Duration::from_millis(200))
        .generate(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Timeout(_)));
}

#[tokio::test]
async fn stream_yields_fragments_until_done() {
    let base = start_upstream().await;
    let fragments: Vec<_> = client(&base, "/stream")
        .generate_stream(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await
        .unwrap()
        .collect()
        .await;
    let text: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
    assert_eq!(text, vec!["fn ", "main", "() {}"]);
}

#[tokio::test]
async fn stream_without_done_ends_in_error() {
    let base = start_upstream().await;
    let fragments: Vec<_> = client(&base, "/truncated")
        .generate_stream(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].as_ref().unwrap(), "partial");
    assert!(fragments[1].is_err());
}

#[tokio::test]
async fn stream_request_status_fails_before_fragments() {
    let base = start_upstream().await;
    let result = client(&base, "/limited")
        .generate_stream(&Prompt::user_only("x"), &GenerationOptions::new("m"))
        .await;
    assert!(matches!(result, Err(LlmError::Status { status: 429, .. })));
}
