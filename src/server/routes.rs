//! HTTP route handlers for the assistant API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::memory::core::errors::StorageError;
use crate::memory::core::ids::ConversationId;
use crate::memory::core::records::{Conversation, Fact, Message};

use super::state::{AppState, DEFAULT_SESSION};

/// Header carrying the client session key.
pub const SESSION_HEADER: &str = "x-session-id";

/// Title used when a client creates a conversation without one.
const DEFAULT_TITLE: &str = "New Chat";

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/suggest", post(suggest))
        .route(
            "/api/conversations",
            get(list_conversations)
                .post(create_conversation)
                .delete(delete_conversations),
        )
        .route("/api/conversations/{id}/activate", post(activate_conversation))
        .route("/api/conversations/{id}/messages", get(conversation_messages))
        .route("/api/reset", post(hard_reset))
        .route("/api/facts", get(list_facts))
        .with_state(state)
}

fn session_key(headers: &HeaderMap) -> &str {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(DEFAULT_SESSION)
}

fn storage_error(err: StorageError) -> (StatusCode, String) {
    match err {
        StorageError::ConversationNotFound(id) => {
            (StatusCode::NOT_FOUND, format!("Conversation {id} not found"))
        }
        other => {
            tracing::error!("Storage error: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Storage error: {other}"))
        }
    }
}

async fn require_conversation(state: &AppState, id: ConversationId) -> ApiResult<()> {
    if state
        .manager()
        .conversation_exists(id)
        .await
        .map_err(storage_error)?
    {
        Ok(())
    } else {
        Err(storage_error(StorageError::ConversationNotFound(id)))
    }
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let generator_ready = match &state.ollama {
        Some(ollama) => Some(ollama.is_ready().await),
        None => None,
    };

    Json(serde_json::json!({
        "status": "ok",
        "service": "offline-assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
        "generator_ready": generator_ready,
    }))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message or tool command.
    pub message: String,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant's reply or tool output.
    pub response: String,
    /// Conversation the session points at after the turn.
    pub conversation_id: Option<ConversationId>,
}

/// Handle one line of user input for the caller's session.
async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message must not be empty".to_string()));
    }

    let session = state.session(session_key(&headers));
    let mut session = session.lock().await;

    let response = state
        .agent
        .handle(&mut session, &request.message)
        .await
        .map_err(storage_error)?;

    Ok(Json(ChatResponse {
        response,
        conversation_id: session.active(),
    }))
}

/// Autocomplete request.
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    /// Partially typed text.
    pub text: String,
}

/// Autocomplete response.
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    /// Suggested continuation, empty when none.
    pub suggestion: String,
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuggestRequest>,
) -> Json<SuggestResponse> {
    let suggestion = state.autocompleter.suggest(&request.text).await;
    Json(SuggestResponse { suggestion })
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let conversations = state
        .manager()
        .list_conversations()
        .await
        .map_err(storage_error)?;
    Ok(Json(conversations))
}

/// New conversation request.
#[derive(Debug, Default, Deserialize)]
pub struct NewConversationRequest {
    /// Optional title; blank titles fall back to a default.
    #[serde(default)]
    pub title: Option<String>,
}

/// Identifier of a conversation touched by a request.
#[derive(Debug, Serialize)]
pub struct ConversationRef {
    /// Conversation id.
    pub id: ConversationId,
}

/// Create a conversation and make it the caller's active one.
async fn create_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<NewConversationRequest>,
) -> ApiResult<(StatusCode, Json<ConversationRef>)> {
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TITLE);

    let session = state.session(session_key(&headers));
    let mut session = session.lock().await;

    let id = state
        .manager()
        .create_conversation(title)
        .await
        .map_err(storage_error)?;
    state.manager().set_active(&mut session, id);

    Ok((StatusCode::CREATED, Json(ConversationRef { id })))
}

async fn activate_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ConversationRef>> {
    let id = ConversationId::new(id);
    require_conversation(&state, id).await?;

    let session = state.session(session_key(&headers));
    let mut session = session.lock().await;
    state.manager().set_active(&mut session, id);

    Ok(Json(ConversationRef { id }))
}

async fn conversation_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Message>>> {
    let id = ConversationId::new(id);
    require_conversation(&state, id).await?;

    let messages = state
        .manager()
        .messages(id, None)
        .await
        .map_err(storage_error)?;
    Ok(Json(messages))
}

/// Delete every conversation; facts survive. All sessions are detached.
async fn delete_conversations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    {
        let session = state.session(session_key(&headers));
        let mut session = session.lock().await;
        state
            .manager()
            .delete_all_conversations(&mut session)
            .await
            .map_err(storage_error)?;
    }
    state.clear_all_sessions().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete conversations, messages and facts. All sessions are detached.
async fn hard_reset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    {
        let session = state.session(session_key(&headers));
        let mut session = session.lock().await;
        state
            .manager()
            .hard_reset(&mut session)
            .await
            .map_err(storage_error)?;
    }
    state.clear_all_sessions().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_facts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Fact>>> {
    let facts = state.manager().facts().await.map_err(storage_error)?;
    Ok(Json(facts))
}
