// libs/chat-cell/tests/integration_test.rs
use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{AppointmentBookingService, InMemoryAppointmentStore};
use chat_cell::handlers::ASSISTANT_UNAVAILABLE_REPLY;
use chat_cell::router::{chat_routes, ChatCellState};
use chat_cell::{
    AgentError, AgentReply, ChatDispatcher, ChatTurn, ConversationStore, ConversationalAgent,
    OpenAiAgent, ToolName, ToolRegistry,
};
use doctor_cell::InMemoryDoctorDirectory;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

// ==============================================================================
// OPENAI AGENT
// ==============================================================================

fn completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    })
}

fn openai_agent(server: &MockServer) -> OpenAiAgent {
    OpenAiAgent::new("sk-test", "gpt-4o-mini", format!("{}/v1", server.uri()))
}

fn schemas() -> Vec<chat_cell::ToolSchema> {
    ToolName::ALL.iter().map(ToolName::schema).collect()
}

#[tokio::test]
async fn openai_agent_parses_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini", "tool_choice": "auto" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_42",
                "type": "function",
                "function": {
                    "name": "scheduleAppointment",
                    "arguments": "{\"doctorId\":\"6f1c\",\"startIso\":\"2030-01-07T09:00\"}"
                }
            }]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![ChatTurn::User { content: "Book Monday 9am".to_string() }];
    let reply = openai_agent(&server).respond("prompt", &schemas(), &history).await.unwrap();

    assert_matches!(reply, AgentReply::ToolCall(call) => {
        assert_eq!(call.id, "call_42");
        assert_eq!(call.name, "scheduleAppointment");
        assert_eq!(call.arguments["startIso"], "2030-01-07T09:00");
    });
}

#[tokio::test]
async fn openai_agent_parses_text_and_sends_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "system", "content": "prompt" }, { "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": "Hello! How can I help you today?"
        }))))
        .mount(&server)
        .await;

    let history = vec![ChatTurn::User { content: "hello".to_string() }];
    let reply = openai_agent(&server).respond("prompt", &schemas(), &history).await.unwrap();
    assert_eq!(reply, AgentReply::Text("Hello! How can I help you today?".to_string()));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let tool_names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(tool_names, vec!["listAvailableDoctors", "scheduleAppointment", "listMyAppointments"]);
}

#[tokio::test]
async fn openai_agent_reports_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let result = openai_agent(&server).respond("prompt", &[], &[]).await;
    assert_matches!(result, Err(AgentError::Api { status: 429, .. }));
}

#[test]
fn agent_requires_api_key() {
    assert!(OpenAiAgent::from_config(&AppConfig::default()).is_none());

    let config = AppConfig { openai_api_key: "sk-test".to_string(), ..AppConfig::default() };
    assert!(OpenAiAgent::from_config(&config).is_some());
}

// ==============================================================================
// HTTP HANDLERS
// ==============================================================================

fn create_test_app(agent: Option<Arc<dyn ConversationalAgent>>) -> (Router, TestConfig) {
    let config = TestConfig::default();
    let doctors = Arc::new(InMemoryDoctorDirectory::new());
    let booking = Arc::new(AppointmentBookingService::new(
        Arc::new(InMemoryAppointmentStore::new()),
        doctors.clone(),
    ));

    let dispatcher = agent.map(|agent| {
        Arc::new(ChatDispatcher::new(agent, ToolRegistry::new(booking, doctors), 5))
    });

    let state = Arc::new(ChatCellState {
        config: config.to_arc(),
        dispatcher,
        conversations: Arc::new(ConversationStore::new()),
    });

    (chat_routes(state), config)
}

async fn send(router: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn unconfigured_assistant_answers_with_fixed_message() {
    let (router, config) = create_test_app(None);
    let token = JwtTestUtils::create_test_token(&TestUser::patient("p@example.com"), &config.jwt_secret, None);

    let (status, body) = send(&router, "POST", "/message", &token, Some(json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], ASSISTANT_UNAVAILABLE_REPLY);
}

#[tokio::test]
async fn chat_round_trip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": "Hi there! Would you like to book an appointment?"
        }))))
        .mount(&server)
        .await;

    let agent: Arc<dyn ConversationalAgent> = Arc::new(openai_agent(&server));
    let (router, config) = create_test_app(Some(agent));
    let user = TestUser::patient("p@example.com");
    let other = TestUser::patient("q@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);
    let other_token = JwtTestUtils::create_test_token(&other, &config.jwt_secret, None);

    let (status, body) = send(&router, "POST", "/message", &token, Some(json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hi there! Would you like to book an appointment?");

    let (_, body) = send(&router, "GET", "/history", &token, None).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["history"][0], json!({"role": "user", "content": "hello"}));

    let (_, body) = send(&router, "GET", "/history", &other_token, None).await;
    assert_eq!(body["total"], 0);

    let (_, body) = send(&router, "POST", "/clear", &token, None).await;
    assert_eq!(body["cleared"], true);

    let (_, body) = send(&router, "GET", "/history", &token, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simultaneous_messages_from_one_user_keep_both_exchanges() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({ "role": "assistant", "content": "Noted." })))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let agent: Arc<dyn ConversationalAgent> = Arc::new(openai_agent(&server));
    let (router, config) = create_test_app(Some(agent));
    let token = JwtTestUtils::create_test_token(&TestUser::patient("p@example.com"), &config.jwt_secret, None);

    let (first, second) = tokio::join!(
        send(&router, "POST", "/message", &token, Some(json!({"message": "first"}))),
        send(&router, "POST", "/message", &token, Some(json!({"message": "second"}))),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    let (_, body) = send(&router, "GET", "/history", &token, None).await;
    assert_eq!(body["total"], 4);
    let users: Vec<&str> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|turn| turn["role"] == "user")
        .map(|turn| turn["content"].as_str().unwrap())
        .collect();
    assert_eq!(users.len(), 2);
    assert!(users.contains(&"first") && users.contains(&"second"));
}

#[tokio::test]
async fn empty_message_and_missing_token_are_rejected() {
    let (router, config) = create_test_app(None);
    let token = JwtTestUtils::create_test_token(&TestUser::patient("p@example.com"), &config.jwt_secret, None);

    let (status, _) = send(&router, "POST", "/message", &token, Some(json!({"message": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/message")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"message": "hi"}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
