//! HTTP request handlers

use super::types::{
    ChatMetadata, ChatRequest, ChatResponse, ErrorResponse, HealthResponse, StatusResponse,
    TimezoneRequest, TimezoneResponse,
};
use super::AppState;
use crate::rate_limit::RateLimited;
use crate::runtime::TurnError;
use crate::settings::is_known_timezone;
use crate::state_machine::TurnErrorKind;
use crate::store::Message;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/react/chat", post(chat))
        .route("/react/config/timezone", post(set_timezone))
        .route(
            "/react/context/:thread_id",
            get(get_context).delete(delete_context),
        )
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    // invalid requests are rejected before they count against the limit
    let Json(req) = payload?;
    if req.question.trim().is_empty() {
        return Err(AppError::BadRequest("question must not be empty".to_string()));
    }
    if req.thread_id.is_empty() {
        return Err(AppError::BadRequest("thread_id must not be empty".to_string()));
    }

    let client = peer.map_or_else(
        || "unknown".to_string(),
        |ConnectInfo(addr)| addr.ip().to_string(),
    );
    state.rate_limiter.admit(&client)?;

    let start = Instant::now();
    let outcome = state
        .runtime
        .chat(&req.thread_id, req.question)
        .await
        .map_err(|e| {
            tracing::error!(thread_id = %req.thread_id, kind = ?e.kind, error = %e, "Turn failed");
            AppError::from(e)
        })?;

    let execution_time_seconds = round_seconds(start.elapsed());
    tracing::info!(
        thread_id = %req.thread_id,
        model_calls = outcome.model_calls,
        tool_rounds = outcome.tool_rounds,
        execution_time_seconds,
        "Chat answered"
    );

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        metadata: ChatMetadata {
            execution_time_seconds,
            tokens: outcome.usage.into(),
            model: state.runtime.model_id().to_string(),
            thread_id: req.thread_id,
        },
    }))
}

/// Seconds rounded to two decimals
fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

// ============================================================
// Configuration
// ============================================================

async fn set_timezone(
    State(state): State<AppState>,
    payload: Result<Json<TimezoneRequest>, JsonRejection>,
) -> Result<Json<TimezoneResponse>, AppError> {
    let Json(req) = payload?;
    if !is_known_timezone(&req.timezone) {
        return Err(AppError::BadRequest(format!(
            "Invalid timezone '{}'. Use an IANA name such as 'America/Bogota'.",
            req.timezone
        )));
    }

    state.settings.set_timezone(req.timezone);
    Ok(Json(TimezoneResponse {
        status: "success",
        current_timezone: state.settings.timezone(),
    }))
}

// ============================================================
// Session context
// ============================================================

async fn get_context(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    state
        .runtime
        .context(&thread_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No context found for '{thread_id}'")))
}

async fn delete_context(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Json<StatusResponse> {
    if state.runtime.reset(&thread_id).await {
        Json(StatusResponse::success(format!(
            "Context for '{thread_id}' deleted."
        )))
    } else {
        Json(StatusResponse::warning("No context found to delete."))
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    TooManyRequests(RateLimited),
    GatewayTimeout(String),
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<RateLimited> for AppError {
    fn from(limited: RateLimited) -> Self {
        AppError::TooManyRequests(limited)
    }
}

impl From<TurnError> for AppError {
    fn from(error: TurnError) -> Self {
        let message = format!("Error processing request: {}", error.message);
        match error.kind {
            TurnErrorKind::Timeout => AppError::GatewayTimeout(message),
            TurnErrorKind::Model
            | TurnErrorKind::ToolRoundLimit
            | TurnErrorKind::Storage
            | TurnErrorKind::Internal => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::TooManyRequests(limited) => {
                // whole seconds, rounded up, never zero
                let secs = (limited.retry_after.as_secs()
                    + u64::from(limited.retry_after.subsec_nanos() > 0))
                .max(1);
                let body = Json(ErrorResponse::new(limited.to_string()));
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    body,
                )
                    .into_response();
            }
            AppError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{RateLimiter, WINDOW};
    use crate::runtime::testing::{text_response, tool_response, DelayedMockLlmClient, MockLlmClient};
    use crate::runtime::{AgentRuntime, LlmClient, RuntimeOptions};
    use crate::settings::SessionSettings;
    use crate::store::MemoryStore;
    use crate::system_prompt::build_system_prompt;
    use crate::tools::ToolRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(llm: Arc<dyn LlmClient>, rate_limit: usize, llm_timeout: Duration) -> (Router, AppState) {
        let settings = Arc::new(SessionSettings::default());
        let tools = Arc::new(ToolRegistry::standard());
        let runtime = AgentRuntime::new(
            Arc::new(MemoryStore::new()),
            llm,
            tools.clone(),
            settings.clone(),
            RuntimeOptions {
                system_prompt: build_system_prompt(&tools),
                max_tool_rounds: 8,
                llm_timeout,
            },
        );
        let state = AppState::new(
            Arc::new(runtime),
            Arc::new(RateLimiter::new(rate_limit, WINDOW)),
            settings,
        );
        (create_router(state.clone()), state)
    }

    fn mock_app(mock: MockLlmClient) -> (Router, AppState) {
        test_app(Arc::new(mock), 10, Duration::from_secs(5))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = mock_app(MockLlmClient::new("mock-model"));
        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_chat_returns_answer_and_metadata() {
        let mock = MockLlmClient::new("mock-model");
        mock.queue_response(tool_response(vec![("c1", "datetime_info", json!({}))]));
        mock.queue_response(text_response("It is noon."));
        let (app, _) = mock_app(mock);

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "What time is it?"}))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["answer"], "It is noon.");
        assert_eq!(body["metadata"]["model"], "mock-model");
        assert_eq!(body["metadata"]["thread_id"], "default_user");
        assert_eq!(
            body["metadata"]["tokens"],
            json!({"input_tokens": 30, "output_tokens": 13, "total_tokens": 43})
        );
        assert!(body["metadata"]["execution_time_seconds"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_chat_rejects_bad_input() {
        let (app, _) = mock_app(MockLlmClient::new("mock-model"));

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "   "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, "POST", "/react/chat", Some(json!({"thread_id": "u1"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/react/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_rate_limited() {
        let mock = MockLlmClient::new("mock-model");
        mock.queue_response(text_response("one"));
        mock.queue_response(text_response("two"));
        let (app, _) = test_app(Arc::new(mock), 2, Duration::from_secs(5));

        for _ in 0..2 {
            let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi"}))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
        assert_eq!(
            json_body(response).await,
            json!({"error": "Rate limit exceeded. Try again later."})
        );
    }

    #[tokio::test]
    async fn test_invalid_requests_do_not_use_rate_limit() {
        let mock = MockLlmClient::new("mock-model");
        mock.queue_response(text_response("one"));
        let (app, _) = test_app(Arc::new(mock), 1, Duration::from_secs(5));

        for body in [json!({"question": ""}), json!({"thread_id": "u1"})] {
            let response = send(&app, "POST", "/react/chat", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_chat_model_failure_is_500() {
        // no response queued: the mock fails the call
        let (app, state) = mock_app(MockLlmClient::new("mock-model"));

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi", "thread_id": "u1"}))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Error processing request"), "{error}");

        // the question stays in the session
        let history = state.runtime.context("u1").await.unwrap();
        assert_eq!(history, vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_chat_timeout_is_504() {
        let mock = DelayedMockLlmClient::new("mock-model", Duration::from_millis(500));
        mock.queue_response(text_response("too late"));
        let (app, _) = test_app(Arc::new(mock), 10, Duration::from_millis(50));

        let response = send(&app, "POST", "/react/chat", Some(json!({"question": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_timezone_validation() {
        let (app, state) = mock_app(MockLlmClient::new("mock-model"));

        let response = send(&app, "POST", "/react/config/timezone", Some(json!({"timezone": "Mars/Olympus"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.settings.timezone(), "UTC");

        let response = send(&app, "POST", "/react/config/timezone", Some(json!({"timezone": "America/Bogota"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "success", "current_timezone": "America/Bogota"})
        );
    }

    #[tokio::test]
    async fn test_clock_follows_configured_timezone() {
        let mock = MockLlmClient::new("mock-model");
        mock.queue_response(tool_response(vec![("c1", "datetime_info", json!({}))]));
        mock.queue_response(text_response("Here is the time in Bogota."));
        let (app, _) = mock_app(mock);

        send(&app, "POST", "/react/config/timezone", Some(json!({"timezone": "America/Bogota"}))).await;
        send(&app, "POST", "/react/chat", Some(json!({"question": "What time is it?", "thread_id": "tz"}))).await;

        let context = json_body(send(&app, "GET", "/react/context/tz", None).await).await;
        let tool_result = &context[2];
        assert_eq!(tool_result["type"], "tool_result");
        assert_eq!(tool_result["name"], "datetime_info");
        let content = tool_result["content"].as_str().unwrap();
        assert!(content.contains("America/Bogota"), "{content}");
        assert!(content.contains("-05:00"), "{content}");
    }

    #[tokio::test]
    async fn test_context_lifecycle() {
        let mock = MockLlmClient::new("mock-model");
        mock.queue_response(text_response("Nice to meet you, Ana."));
        let (app, _) = mock_app(mock);

        let response = send(&app, "GET", "/react/context/u1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        send(&app, "POST", "/react/chat", Some(json!({"question": "I am Ana", "thread_id": "u1"}))).await;

        let response = send(&app, "GET", "/react/context/u1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!([
                {"type": "user", "content": "I am Ana"},
                {"type": "assistant", "content": "Nice to meet you, Ana."},
            ])
        );

        let response = send(&app, "DELETE", "/react/context/u1", None).await;
        assert_eq!(
            json_body(response).await,
            json!({"status": "success", "message": "Context for 'u1' deleted."})
        );

        let response = send(&app, "GET", "/react/context/u1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "DELETE", "/react/context/u1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "warning");
    }

    #[test]
    fn test_round_seconds() {
        assert!((round_seconds(Duration::from_millis(1234)) - 1.23).abs() < 1e-9);
        assert!((round_seconds(Duration::from_millis(5)) - 0.01).abs() < 1e-9);
    }
}
