// libs/chat-cell/src/services/dispatch.rs
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{AgentReply, ChatTurn, ConversationState, TurnOutcome};
use crate::services::agent::ConversationalAgent;
use crate::services::prompt::build_system_prompt;
use crate::services::tools::ToolRegistry;

pub const AGENT_FAILURE_REPLY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again in a few moments.";

pub const ITERATION_LIMIT_REPLY: &str =
    "I'm sorry, I wasn't able to finish that request. Could you try rephrasing it?";

/// Drives one conversation turn: the agent alternates between tool calls and
/// a final answer until it answers, fails, or exhausts its tool budget.
pub struct ChatDispatcher {
    agent: Arc<dyn ConversationalAgent>,
    registry: ToolRegistry,
    max_tool_iterations: usize,
}

impl ChatDispatcher {
    pub fn new(agent: Arc<dyn ConversationalAgent>, registry: ToolRegistry, max_tool_iterations: usize) -> Self {
        Self { agent, registry, max_tool_iterations }
    }

    pub async fn process_turn(
        &self,
        state: ConversationState,
        caller_patient_id: Uuid,
        message: &str,
    ) -> TurnOutcome {
        self.process_turn_at(state, caller_patient_id, message, Local::now().naive_local())
            .await
    }

    /// Runs a turn with the prompt dated `now`.
    pub async fn process_turn_at(
        &self,
        mut state: ConversationState,
        caller_patient_id: Uuid,
        message: &str,
        now: NaiveDateTime,
    ) -> TurnOutcome {
        state.push(ChatTurn::User { content: message.to_string() });

        let system_prompt = build_system_prompt(now);
        let tools = self.registry.schemas();
        let mut tool_calls = 0;

        loop {
            let reply = match self.agent.respond(&system_prompt, &tools, &state.history).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Agent failed for patient {}: {}", caller_patient_id, e);
                    return finish(state, AGENT_FAILURE_REPLY.to_string());
                }
            };

            match reply {
                AgentReply::Text(text) => {
                    debug!("Turn for patient {} finished after {} tool calls", caller_patient_id, tool_calls);
                    return finish(state, text);
                }
                AgentReply::ToolCall(call) => {
                    if tool_calls >= self.max_tool_iterations {
                        warn!(
                            "Tool call limit of {} reached for patient {}; dropping call to {}",
                            self.max_tool_iterations, caller_patient_id, call.name
                        );
                        return finish(state, ITERATION_LIMIT_REPLY.to_string());
                    }
                    tool_calls += 1;

                    let response = self.registry.execute(&call, caller_patient_id).await;
                    info!(
                        "Tool {} for patient {} -> {}",
                        call.name,
                        caller_patient_id,
                        if response.is_success() { "ok" } else { "error" }
                    );

                    let (call_id, name) = (call.id.clone(), call.name.clone());
                    state.push(ChatTurn::ToolCall { call });
                    state.push(ChatTurn::ToolResult { call_id, name, result: response.to_json() });
                }
            }
        }
    }
}

fn finish(mut state: ConversationState, reply: String) -> TurnOutcome {
    state.push(ChatTurn::Assistant { content: reply.clone() });
    TurnOutcome { state, reply }
}
