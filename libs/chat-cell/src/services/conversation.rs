// libs/chat-cell/src/services/conversation.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use shared_config::DEFAULT_MAX_HISTORY_TURNS;

use crate::models::ConversationState;

/// Per-user conversation history, kept in process memory.
///
/// Each user has their own session lock, so two messages from the same user
/// run one after the other while different users proceed in parallel.
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
    max_turns: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_max_turns(DEFAULT_MAX_HISTORY_TURNS)
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: usize) -> Self {
        Self { sessions: RwLock::default(), max_turns }
    }

    async fn session(&self, user_id: &str) -> Arc<Mutex<ConversationState>> {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return session.clone();
        }

        self.sessions
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Waits for the user's session and holds it until the returned handle
    /// is committed or dropped.
    pub async fn lock(&self, user_id: &str) -> ConversationSession {
        let guard = self.session(user_id).await.lock_owned().await;
        ConversationSession { guard, max_turns: self.max_turns }
    }

    /// The user's state, or an empty one for a new conversation.
    pub async fn load(&self, user_id: &str) -> ConversationState {
        let session = self.sessions.read().await.get(user_id).cloned();
        match session {
            Some(session) => session.lock().await.clone(),
            None => ConversationState::default(),
        }
    }

    pub async fn save(&self, user_id: &str, state: ConversationState) {
        self.lock(user_id).await.commit(state);
    }

    /// Empties the user's history once any turn in progress has finished.
    pub async fn clear(&self, user_id: &str) -> bool {
        let session = self.sessions.read().await.get(user_id).cloned();
        let removed = match session {
            Some(session) => !std::mem::take(&mut *session.lock().await).history.is_empty(),
            None => false,
        };
        debug!("Cleared conversation for {} (existed: {})", user_id, removed);
        removed
    }
}

/// Exclusive access to one user's conversation.
pub struct ConversationSession {
    guard: OwnedMutexGuard<ConversationState>,
    max_turns: usize,
}

impl ConversationSession {
    pub fn state(&self) -> &ConversationState {
        &self.guard
    }

    /// Stores `state` as the user's history, dropping the oldest turns past
    /// the store's limit.
    pub fn commit(mut self, mut state: ConversationState) {
        let before = state.history.len();
        state.trim_to(self.max_turns);
        if state.history.len() < before {
            debug!("Trimmed {} old turns from conversation", before - state.history.len());
        }
        *self.guard = state;
    }
}
