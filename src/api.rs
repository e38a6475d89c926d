//! REST API for the research agent
//!
//! Each request loads the conversation from the checkpoint store, runs the
//! agent until it terminates or suspends, and saves the checkpoint again.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{Agent, TurnOutcome};
use crate::error::AgentError;
use crate::memory::Namespace;
use crate::state::{CheckpointStore, ConversationState};

//
// ================= Request Models =================
//

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub thread_id: String,
    pub answer: String,
}

//
// ================= Response Wrapper =================
//

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn failure(status: StatusCode, message: String) -> ApiResult {
    (status, Json(ApiResponse::error(message)))
}

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::InvalidState(_) => StatusCode::CONFLICT,
        AgentError::ToolNotFound(_) | AgentError::InvalidToolInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AgentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::LlmError(_) | AgentError::Adapter(_) | AgentError::HttpError(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//
// ================= API State =================
//

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

/// Thread ids are UUIDs; any other string maps to a stable UUID derived from it.
fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_thread_id(value: &str) -> Uuid {
    let value = value.trim();
    Uuid::parse_str(value).unwrap_or_else(|_| stable_uuid_from_string(value))
}

/// Split `clients` or `clients,archive` / `clients.archive` into namespace parts.
fn parse_namespace(value: &str) -> Namespace {
    Namespace::new(
        value
            .split(|c: char| c == ',' || c == '.')
            .map(str::trim)
            .filter(|part| !part.is_empty()),
    )
}

fn turn_payload(state: &ConversationState, outcome: &TurnOutcome) -> serde_json::Value {
    serde_json::json!({
        "thread_id": state.thread_id,
        "outcome": outcome,
        "phase": state.phase.label(),
        "blueprint": state.current_blueprint,
    })
}

/// Persist whatever the agent left behind, then report the run result.
async fn finish_turn(
    app: &AppState,
    state: &ConversationState,
    result: crate::Result<TurnOutcome>,
) -> ApiResult {
    if let Err(e) = app.checkpoints.save(state).await {
        error!(thread_id = %state.thread_id, "Checkpoint save failed: {}", e);
        return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(turn_payload(state, &outcome))),
        ),
        Err(e) => {
            error!(thread_id = %state.thread_id, "Turn failed: {}", e);
            failure(status_for(&e), e.to_string())
        }
    }
}

//
// ================= Handlers =================
//

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat_handler(State(app): State<AppState>, Json(req): Json<ChatRequest>) -> ApiResult {
    if req.message.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "message must not be empty".into());
    }

    let thread_id = req
        .thread_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(parse_thread_id)
        .unwrap_or_else(Uuid::new_v4);

    let mut state = match app.checkpoints.load(thread_id).await {
        Ok(Some(state)) => state,
        Ok(None) => ConversationState::with_thread_id(thread_id, req.user_id.clone()),
        Err(e) => return failure(status_for(&e), e.to_string()),
    };
    info!(thread_id = %thread_id, messages = state.message_count(), "Chat request");

    let result = app.agent.submit_user_message(&mut state, &req.message).await;
    finish_turn(&app, &state, result).await
}

async fn resume_handler(State(app): State<AppState>, Json(req): Json<ResumeRequest>) -> ApiResult {
    let thread_id = parse_thread_id(&req.thread_id);

    let mut state = match app.checkpoints.load(thread_id).await {
        Ok(Some(state)) => state,
        Ok(None) => {
            return failure(StatusCode::NOT_FOUND, format!("Unknown thread {}", thread_id))
        }
        Err(e) => return failure(status_for(&e), e.to_string()),
    };
    info!(thread_id = %thread_id, "Resume request");

    let result = app.agent.resume(&mut state, &req.answer).await;
    finish_turn(&app, &state, result).await
}

async fn thread_handler(State(app): State<AppState>, Path(thread_id): Path<String>) -> ApiResult {
    let thread_id = parse_thread_id(&thread_id);

    match app.checkpoints.load(thread_id).await {
        Ok(Some(state)) => (StatusCode::OK, Json(ApiResponse::success(state))),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Unknown thread {}", thread_id)),
        Err(e) => failure(status_for(&e), e.to_string()),
    }
}

async fn memory_handler(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> ApiResult {
    let namespace = parse_namespace(&namespace);

    match app.agent.memory().get(&namespace, &key).await {
        Ok(Some(item)) => (StatusCode::OK, Json(ApiResponse::success(item))),
        Ok(None) => failure(
            StatusCode::NOT_FOUND,
            format!("No item {} in {}", key, namespace),
        ),
        Err(e) => failure(status_for(&e), e.to_string()),
    }
}

//
// ================= Router =================
//

pub fn create_router(agent: Arc<Agent>, checkpoints: Arc<dyn CheckpointStore>) -> Router {
    let state = AppState { agent, checkpoints };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/resume", post(resume_handler))
        .route("/api/threads/:thread_id", get(thread_handler))
        .route("/api/memory/:namespace/:key", get(memory_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    agent: Arc<Agent>,
    checkpoints: Arc<dyn CheckpointStore>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent, checkpoints);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::llm::{ModelResponse, ScriptedModel};
    use crate::memory::{InMemoryStore, MemoryStore};
    use crate::models::{HumanQuery, ToolCallRequest};
    use crate::state::InMemoryCheckpointStore;
    use crate::tools::testing::StubTool;
    use crate::tools::{ToolOutcome, ToolRegistry};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    fn router(responses: Vec<ModelResponse>, memory: Arc<InMemoryStore>) -> Router {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("human_assistance", |args| {
            Ok(ToolOutcome::Interrupt(HumanQuery::new(
                args["query"].as_str().unwrap_or_default(),
            )))
        })));

        let agent = Agent::new(
            Box::new(ScriptedModel::new(responses)),
            Arc::new(registry),
            memory,
            AgentConfig::default(),
        );
        create_router(Arc::new(agent), Arc::new(InMemoryCheckpointStore::new()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = assert_ok!(axum::body::to_bytes(response.into_body(), usize::MAX).await);
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(vec![], Arc::new(InMemoryStore::new()));
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_suspend_resume_and_thread_lookup() {
        let app = router(
            vec![
                ModelResponse::with_tool_calls(vec![ToolCallRequest::new(
                    "call_1",
                    "human_assistance",
                    json!({"query": "Which Micron entity?"}),
                )]),
                ModelResponse::text("Using Micron Technology (MU)."),
            ],
            Arc::new(InMemoryStore::new()),
        );

        let (status, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({"message": "Look up Micron"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"]["status"], "suspended");
        assert_eq!(body["data"]["outcome"]["query"]["query"], "Which Micron entity?");
        assert_eq!(body["data"]["phase"], "awaiting_human");
        let thread_id = body["data"]["thread_id"].as_str().unwrap().to_string();

        // A new message is refused while the question is open
        let (status, _) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({"thread_id": thread_id, "message": "hello?"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "POST",
            "/api/resume",
            Some(json!({"thread_id": thread_id, "answer": "Micron Technology"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"]["status"], "completed");
        assert_eq!(body["data"]["outcome"]["answer"], "Using Micron Technology (MU).");

        let (status, body) = send(&app, "GET", &format!("/api/threads/{}", thread_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_resume_unknown_thread_is_404() {
        let app = router(vec![], Arc::new(InMemoryStore::new()));
        let (status, body) = send(
            &app,
            "POST",
            "/api/resume",
            Some(json!({"thread_id": Uuid::new_v4().to_string(), "answer": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_memory_lookup() {
        let memory = Arc::new(InMemoryStore::new());
        memory
            .put(
                &Namespace::clients(),
                "CIK0000723125",
                json!({"cik": "CIK0000723125", "name": "Micron Technology", "tickers": ["MU"]}),
            )
            .await
            .unwrap();
        let app = router(vec![], memory);

        let (status, body) = send(&app, "GET", "/api/memory/clients/CIK0000723125", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["value"]["tickers"], json!(["MU"]));

        let (status, _) = send(&app, "GET", "/api/memory/clients/CIK0000000001", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_thread_and_namespace_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_thread_id(&id.to_string()), id);
        assert_eq!(parse_thread_id("desk-42"), parse_thread_id("desk-42"));
        assert_eq!(parse_namespace("clients"), Namespace::clients());
        assert_eq!(
            parse_namespace("clients.archive"),
            Namespace::new(["clients", "archive"])
        );
    }
}
