// libs/chat-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::caller_patient_id;

use crate::models::{ChatMessageRequest, ChatMessageResponse};
use crate::router::ChatCellState;

pub const ASSISTANT_UNAVAILABLE_REPLY: &str =
    "Sorry, the virtual assistant is not available right now because it has not been configured. \
     You can still book appointments directly.";

pub async fn send_message(
    State(state): State<Arc<ChatCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let Some(dispatcher) = state.dispatcher.as_ref() else {
        warn!("Chat message received but no assistant is configured");
        return Ok(Json(ChatMessageResponse { response: ASSISTANT_UNAVAILABLE_REPLY.to_string() }));
    };

    let patient_id = caller_patient_id(&user)?;

    // Held for the whole turn so a second message from this user waits.
    let session = state.conversations.lock(&user.id).await;

    let outcome = dispatcher
        .process_turn(session.state().clone(), patient_id, message)
        .await;
    info!("Chat turn completed for {} ({} turns in history)", user.id, outcome.state.history.len());

    session.commit(outcome.state);

    Ok(Json(ChatMessageResponse { response: outcome.reply }))
}

pub async fn get_history(
    State(state): State<Arc<ChatCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let conversation = state.conversations.load(&user.id).await;

    Ok(Json(json!({
        "history": conversation.history,
        "total": conversation.history.len()
    })))
}

pub async fn clear_history(
    State(state): State<Arc<ChatCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let cleared = state.conversations.clear(&user.id).await;

    Ok(Json(json!({
        "success": true,
        "cleared": cleared,
        "message": "Conversation cleared"
    })))
}
