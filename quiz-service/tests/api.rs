use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quiz_service::{AppState, config::EnvVars, router};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Throwaway stand-in for the generation capability: replies with a fixed
/// status and body to any request, counting hits.
struct Upstream {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

async fn spawn_upstream(status: StatusCode, body: Value) -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = hits.clone();
    let app = Router::new().fallback(move || {
        let hits = handler_hits.clone();
        let body = body.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (status, Json(body))
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub upstream");
    let addr = listener.local_addr().expect("stub upstream address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub upstream");
    });

    Upstream {
        base_url: format!("http://{addr}"),
        hits,
    }
}

fn test_env(api_base: &str, api_key: Option<&str>) -> EnvVars {
    EnvVars {
        gemini_api_key: api_key.map(str::to_string),
        gemini_api_base: api_base.to_string(),
        generate_model: "test-generate-model".to_string(),
        feedback_model: "test-feedback-model".to_string(),
        max_questions: 20,
        port: 0,
        request_body_size_limit: 10 * 1024 * 1024,
        request_timeout_in_ms: 5_000,
    }
}

fn app(env_vars: EnvVars) -> Router {
    router(AppState {
        client: reqwest::Client::new(),
        env_vars,
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request build should succeed")
}

fn text_data_url(text: &str) -> String {
    format!("data:text/plain;base64,{}", BASE64.encode(text.as_bytes()))
}

fn generate_body(text: &str) -> Value {
    json!({
        "fileDataUrl": text_data_url(text),
        "fileType": "text/plain",
        "fileName": "notes.txt",
    })
}

/// Gemini-style success envelope whose candidate text is `text`.
fn candidate_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn questions_json(count: usize) -> String {
    let questions: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "question": format!("Question {i}?"),
                "options": [
                    format!("right {i}"),
                    format!("wrong {i}a"),
                    format!("wrong {i}b"),
                    format!("wrong {i}c"),
                ],
                "answer": format!("right {i}"),
                "topic": "general",
            })
        })
        .collect();
    Value::Array(questions).to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

#[tokio::test]
async fn generate_quiz_returns_parsed_questions() {
    let upstream = spawn_upstream(StatusCode::OK, candidate_reply(&questions_json(3))).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let questions = body["questions"].as_array().expect("questions array");
    assert_eq!(questions.len(), 3);
    for q in questions {
        let options = q["options"].as_array().expect("options array");
        assert_eq!(options.len(), 4);
        assert!(options.contains(&q["answer"]));
    }
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generate_quiz_rejects_other_methods() {
    let app = app(test_env("http://127.0.0.1:9", Some("test-key")));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/generate-quiz")
        .body(Body::empty())
        .expect("request build should succeed");
    let response = app.oneshot(request).await.expect("router should respond");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn generate_quiz_requires_every_file_field() {
    let app = app(test_env("http://127.0.0.1:9", Some("test-key")));

    let mut body = generate_body("Hello world");
    body.as_object_mut().unwrap().remove("fileDataUrl");

    let response = app
        .oneshot(post_json("/api/generate-quiz", &body))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("fileDataUrl"));
}

#[tokio::test]
async fn upstream_error_message_is_forwarded() {
    let upstream = spawn_upstream(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "message": "overloaded" } }),
    )
    .await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn code_fenced_reply_is_tolerated() {
    let fenced = format!("```json\n{}\n```", questions_json(2));
    let upstream = spawn_upstream(StatusCode::OK, candidate_reply(&fenced)).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn non_array_reply_is_a_generic_server_error() {
    let upstream =
        spawn_upstream(StatusCode::OK, candidate_reply(r#"{"questions":[]}"#)).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    // Parse diagnostics stay server-side.
    assert_eq!(
        body["error"].as_str().unwrap(),
        "could not generate a result from the document"
    );
}

#[tokio::test]
async fn reply_without_candidates_is_a_server_error() {
    let upstream = spawn_upstream(StatusCode::OK, json!({ "candidates": [] })).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn whitespace_document_never_reaches_upstream() {
    let upstream = spawn_upstream(StatusCode::OK, candidate_reply("[]")).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json("/api/generate-quiz", &generate_body("  \n\t  ")))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("extracted"));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_api_key_short_circuits_both_endpoints() {
    let upstream = spawn_upstream(StatusCode::OK, candidate_reply("[]")).await;
    let app = app(test_env(&upstream.base_url, None));

    let generate = app
        .clone()
        .oneshot(post_json("/api/generate-quiz", &generate_body("Hello world")))
        .await
        .expect("router should respond");
    assert_eq!(generate.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(generate).await;
    assert!(!body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));

    let analyze = app
        .oneshot(post_json(
            "/api/analyze-results",
            &json!({ "incorrectAnswers": [] }),
        ))
        .await
        .expect("router should respond");
    assert_eq!(analyze.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_miss_list_returns_fixed_feedback_without_upstream_call() {
    let upstream = spawn_upstream(StatusCode::OK, candidate_reply("unused")).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let response = app
        .oneshot(post_json(
            "/api/analyze-results",
            &json!({ "incorrectAnswers": [] }),
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["feedback"], "¡Felicidades! No tuviste errores.");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analyze_results_requires_an_array() {
    let app = app(test_env("http://127.0.0.1:9", Some("test-key")));

    let response = app
        .oneshot(post_json(
            "/api/analyze-results",
            &json!({ "incorrectAnswers": "not an array" }),
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("incorrectAnswers"));
}

#[tokio::test]
async fn analyze_results_returns_trimmed_candidate_text() {
    let upstream = spawn_upstream(
        StatusCode::OK,
        candidate_reply("  Review cell biology and genetics.  \n"),
    )
    .await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let missed = json!({
        "incorrectAnswers": [{
            "question": "Which organelle produces ATP?",
            "options": ["Mitochondria", "Nucleus", "Ribosome", "Golgi"],
            "answer": "Mitochondria",
            "topic": "cell biology",
        }]
    });
    let response = app
        .oneshot(post_json("/api/analyze-results", &missed))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["feedback"], "Review cell biology and genetics.");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn analyze_results_degrades_to_fallback_on_unusable_reply() {
    // Success status, but no candidate text anywhere.
    let upstream = spawn_upstream(StatusCode::OK, json!({ "candidates": [] })).await;
    let app = app(test_env(&upstream.base_url, Some("test-key")));

    let missed = json!({
        "incorrectAnswers": [{
            "question": "q",
            "options": ["a", "b", "c", "d"],
            "answer": "a",
        }]
    });
    let response = app
        .oneshot(post_json("/api/analyze-results", &missed))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["feedback"],
        "No se pudo generar feedback específico, pero ¡sigue estudiando!"
    );
}

#[tokio::test]
async fn status_ping_responds() {
    let app = app(test_env("http://127.0.0.1:9", Some("test-key")));
    let request = Request::builder()
        .uri("/status/ping")
        .body(Body::empty())
        .expect("request build should succeed");
    let response = app.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
}
