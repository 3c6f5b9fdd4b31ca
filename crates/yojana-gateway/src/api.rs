use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use yojana_core::{ConversationTurn, YojanaError};
use yojana_session::SessionSummary;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
    pub sources: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionCreate {
    #[serde(default)]
    pub title: Option<String>,
}

/// One turn as exposed over the API; `id` is the turn's sequence number.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: u64,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ConversationTurn> for MessageResponse {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.seq,
            role: turn.role.as_str().to_string(),
            content: turn.content,
            timestamp: turn.timestamp,
        }
    }
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Yojana government schemes assistant API",
        "status": "running",
    }))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let indexed = state.vectors.count().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "yojana",
        "indexed_documents": indexed,
    })))
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .pipeline
        .answer(request.session_id, &request.query)
        .await?;
    Ok(Json(ChatResponse {
        response: reply.answer,
        session_id: reply.session_id,
        sources: reply.sources,
    }))
}

pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SessionSummary>, ApiError> {
    // The body is optional; an empty one creates an untitled session.
    let request: SessionCreate = if body.iter().all(u8::is_ascii_whitespace) {
        SessionCreate::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| YojanaError::InvalidInput(format!("invalid session body: {e}")))?
    };
    let session = state
        .sessions
        .create_session(request.title.as_deref())
        .await?;
    info!(session_id = %session.id, "Session created via API");
    Ok(Json(session))
}

pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(state.sessions.list_sessions().await?))
}

pub async fn session_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let turns = state.sessions.get_turns(id).await?;
    Ok(Json(turns.into_iter().map(MessageResponse::from).collect()))
}

pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.sessions.delete_session(id).await?;
    info!(session_id = %id, "Session deleted via API");
    Ok(Json(json!({"message": "Session deleted successfully"})))
}
