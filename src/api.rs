//! REST API server for the turn orchestrator
//!
//! POST /chat {user_id, message} → {reply}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::agent::TurnOrchestrator;
use crate::error::OrchestrationError;
use crate::models::{TurnDisposition, TurnRequest};

/// =============================
/// Wire Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub timestamp: String,
}

impl ApiError {
    pub fn new(message: String) -> Self {
        Self {
            error: message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "health-turn-orchestrator",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let request = TurnRequest {
        user_id: req.user_id,
        message: req.message,
    };

    match state.orchestrator.handle_turn(request).await {
        Ok(turn) => {
            let status = match turn.disposition {
                TurnDisposition::GenerationFailed => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            (status, json_body(ChatResponse { reply: turn.reply }))
        }
        Err(OrchestrationError::InvalidRequest(message)) => {
            (StatusCode::BAD_REQUEST, json_body(ApiError::new(message)))
        }
        Err(e) => {
            error!("Turn failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json_body(ApiError::new("Internal error while processing the message".into())),
            )
        }
    }
}

fn json_body<T: Serialize>(value: T) -> Json<serde_json::Value> {
    Json(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<TurnOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<TurnOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{OrchestratorConfig, GENERATION_FALLBACK};
    use crate::memory::{ContextSummarizer, MemoryCompactor};
    use crate::oracle::{MockOracle, OracleTask};
    use crate::state::InMemoryStateStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(generation: Option<&'static str>) -> Router {
        let oracle = Arc::new(MockOracle::new(move |task, _| match task {
            OracleTask::Classification => Some("off_topic".to_string()),
            OracleTask::Extraction => Some("{}".to_string()),
            OracleTask::Summarization => Some("notes".to_string()),
            OracleTask::Generation => generation.map(str::to_string),
        }));
        let compactor = MemoryCompactor::new(ContextSummarizer::new(oracle.clone()));
        let orchestrator = TurnOrchestrator::new(
            Arc::new(InMemoryStateStore::new()),
            oracle,
            compactor,
            OrchestratorConfig::default(),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn post_chat(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_chat_reply() {
        let (status, body) = post_chat(
            router(Some("Namaste!")),
            serde_json::json!({"user_id": "asha", "message": "hello"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "Namaste!");
    }

    #[tokio::test]
    async fn test_generation_failure_is_503_with_fallback() {
        let (status, body) = post_chat(
            router(None),
            serde_json::json!({"user_id": "asha", "message": "hello"}),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["reply"], GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_blank_user_is_bad_request() {
        let (status, body) = post_chat(
            router(Some("unused")),
            serde_json::json!({"user_id": " ", "message": "hello"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
