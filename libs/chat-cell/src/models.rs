// libs/chat-cell/src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use shared_models::error::ErrorKind;

// ==============================================================================
// CONVERSATION MODELS
// ==============================================================================

/// A tool invocation requested by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// One entry of a conversation's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatTurn {
    User { content: String },
    Assistant { content: String },
    ToolCall { call: ToolCall },
    ToolResult { call_id: String, name: String, result: Value },
}

/// Everything needed to continue a conversation. Passed into and returned
/// from each turn, so a stored state can be replayed against any agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub history: Vec<ChatTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.history.push(turn);
    }

    /// Drops the oldest turns so at most `max_turns` remain. The kept history
    /// always starts at a user message, so no tool result loses its call.
    pub fn trim_to(&mut self, max_turns: usize) {
        if self.history.len() <= max_turns {
            return;
        }

        let mut start = self.history.len() - max_turns;
        while start < self.history.len() && !matches!(self.history[start], ChatTurn::User { .. }) {
            start += 1;
        }
        self.history.drain(..start);
    }

    /// Text of the most recent assistant turn.
    pub fn last_reply(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|turn| match turn {
            ChatTurn::Assistant { content } => Some(content.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub reply: String,
}

/// What the agent produced for one step of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    ToolCall(ToolCall),
    Text(String),
}

/// Function-tool description handed to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ==============================================================================
// TOOLS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    ListAvailableDoctors,
    ScheduleAppointment,
    ListMyAppointments,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::ListAvailableDoctors,
        ToolName::ScheduleAppointment,
        ToolName::ListMyAppointments,
    ];

    /// Accepts the advertised name or its snake_case alias.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name || tool.alias() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListAvailableDoctors => "listAvailableDoctors",
            ToolName::ScheduleAppointment => "scheduleAppointment",
            ToolName::ListMyAppointments => "listMyAppointments",
        }
    }

    fn alias(&self) -> &'static str {
        match self {
            ToolName::ListAvailableDoctors => "list_available_doctors",
            ToolName::ScheduleAppointment => "schedule_appointment",
            ToolName::ListMyAppointments => "list_my_appointments",
        }
    }

    /// Tools that act on behalf of the signed-in patient.
    pub fn requires_patient_id(&self) -> bool {
        matches!(self, ToolName::ScheduleAppointment | ToolName::ListMyAppointments)
    }

    /// The patient is always the caller, so `patientId` is not advertised.
    pub fn schema(&self) -> ToolSchema {
        let (description, parameters) = match self {
            ToolName::ListAvailableDoctors => (
                "List the clinic's doctors with their specialty and weekly working hours. \
                 Optionally filter by specialty.",
                json!({
                    "type": "object",
                    "properties": {
                        "specialty": {
                            "type": "string",
                            "description": "Medical specialty to filter by, e.g. Cardiology"
                        }
                    }
                }),
            ),
            ToolName::ScheduleAppointment => (
                "Book an appointment for the current patient with a doctor.",
                json!({
                    "type": "object",
                    "properties": {
                        "doctorId": {
                            "type": "string",
                            "description": "Id of the doctor, as returned by listAvailableDoctors"
                        },
                        "startIso": {
                            "type": "string",
                            "description": "Local start date and time formatted YYYY-MM-DDTHH:MM"
                        },
                        "durationMinutes": {
                            "type": "integer",
                            "description": "Length of the appointment in minutes, 30 if omitted"
                        },
                        "notes": {
                            "type": "string",
                            "description": "Reason for the visit"
                        }
                    },
                    "required": ["doctorId", "startIso"]
                }),
            ),
            ToolName::ListMyAppointments => (
                "List the current patient's appointments, most recent first.",
                json!({ "type": "object", "properties": {} }),
            ),
        };

        ToolSchema {
            name: self.as_str().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDoctorsArgs {
    #[serde(default)]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleAppointmentArgs {
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
    #[serde(alias = "doctorId")]
    pub doctor_id: Uuid,
    #[serde(alias = "startIso")]
    pub start_iso: String,
    #[serde(default, alias = "durationMinutes")]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMyAppointmentsArgs {
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
}

/// Outcome of a tool execution, always fed back to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    Success(Map<String, Value>),
    Error { kind: ErrorKind, message: String },
}

impl ToolResponse {
    pub fn success(payload: Value) -> Self {
        match payload {
            Value::Object(map) => ToolResponse::Success(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ToolResponse::Success(map)
            }
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ToolResponse::Error { kind, message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResponse::Success(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ToolResponse::Success(_) => None,
            ToolResponse::Error { kind, .. } => Some(*kind),
        }
    }

    /// `{"success": true, ...payload}` or `{"success": false, "kind", "error"}`.
    pub fn to_json(&self) -> Value {
        match self {
            ToolResponse::Success(payload) => {
                let mut body = Map::with_capacity(payload.len() + 1);
                body.insert("success".to_string(), Value::Bool(true));
                body.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(body)
            }
            ToolResponse::Error { kind, message } => json!({
                "success": false,
                "kind": kind,
                "error": message,
            }),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageResponse {
    pub response: String,
}
