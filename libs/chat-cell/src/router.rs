// libs/chat-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::conversation::ConversationStore;
use crate::services::dispatch::ChatDispatcher;

pub struct ChatCellState {
    pub config: Arc<AppConfig>,
    /// `None` when no agent is configured.
    pub dispatcher: Option<Arc<ChatDispatcher>>,
    pub conversations: Arc<ConversationStore>,
}

pub fn chat_routes(state: Arc<ChatCellState>) -> Router {
    Router::new()
        .route("/message", post(handlers::send_message))
        .route("/history", get(handlers::get_history))
        .route("/clear", post(handlers::clear_history))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
