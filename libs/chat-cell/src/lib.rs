pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AgentReply, ChatTurn, ConversationState, ToolCall, ToolName, ToolResponse, ToolSchema, TurnOutcome,
};
pub use services::agent::{AgentError, ConversationalAgent, OpenAiAgent};
pub use services::conversation::{ConversationSession, ConversationStore};
pub use services::dispatch::{ChatDispatcher, AGENT_FAILURE_REPLY, ITERATION_LIMIT_REPLY};
pub use services::tools::ToolRegistry;
