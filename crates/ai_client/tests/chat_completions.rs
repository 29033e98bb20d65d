// Integration tests for the chat-completions client against a mock server.
// Run with: cargo test -p tabsight-ai-client --test chat_completions

use std::time::Duration;

use httpmock::prelude::*;
use tabsight_ai_client::{AiClientError, OpenAiCompatibleClient};
use tabsight_engine::remote::{CompletionRequest, RemoteError, RemoteInsightProvider};
use tabsight_engine::{Column, ColumnType, FixedClock, InterpretationSource, Interpreter, QueryEngine, Row};

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "You are a test.".to_string(),
        user: "Say hi".to_string(),
        temperature: 0.3,
        max_tokens: 2000,
    }
}

fn client(server: &MockServer) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::with_base_url("openai", "sk-test", "gpt-4", server.base_url(), Duration::from_secs(5))
        .unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

#[test]
fn returns_first_choice_content() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(completion("{\"confidence\": 0.9}"));
    });

    let content = client(&server).chat(&request()).unwrap();

    mock.assert();
    assert_eq!(content, "{\"confidence\": 0.9}");
}

#[test]
fn non_2xx_carries_provider_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            }));
    });

    let err = client(&server).chat(&request()).unwrap_err();
    assert_eq!(
        err,
        AiClientError::Api { status: 401, message: "Incorrect API key provided".to_string() }
    );
}

#[test]
fn malformed_body_is_parse_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).header("content-type", "application/json").body("<html>oops</html>");
    });

    let err = client(&server).complete(&request()).unwrap_err();
    assert!(matches!(err, RemoteError::Parse(_)), "got {:?}", err);
}

#[test]
fn no_choices_is_empty_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(serde_json::json!({"choices": []}));
    });

    assert_eq!(client(&server).chat(&request()), Err(AiClientError::EmptyResponse));
}

#[test]
fn unreachable_server_is_network_error() {
    let client = OpenAiCompatibleClient::with_base_url(
        "openai",
        "sk-test",
        "gpt-4",
        "http://127.0.0.1:9",
        Duration::from_secs(2),
    )
    .unwrap();
    assert!(matches!(client.chat(&request()), Err(AiClientError::Network(_))));
}

// ---------------------------------------------------------------------------
// Through the engine
// ---------------------------------------------------------------------------

fn dataset() -> (Vec<Row>, Vec<Column>) {
    let rows = vec![
        Row::new().with("name", "Ana").with("score", 40).with("active", true),
        Row::new().with("name", "Ben").with("score", 90).with("active", false),
    ];
    let schema = vec![
        Column::new("name", "Name", ColumnType::String),
        Column::new("score", "Score", ColumnType::Number),
        Column::new("active", "Active", ColumnType::Boolean),
    ];
    (rows, schema)
}

#[test]
fn engine_uses_remote_instruction() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(
            r#"{"filters": [{"column": "score", "operator": "greater_than", "value": 50}],
                "insights": [{"type": "summary", "title": "One", "description": "One match.", "confidence": 0.8}],
                "confidence": 0.93}"#,
        ));
    });

    let (rows, schema) = dataset();
    let engine = QueryEngine::new()
        .with_clock(Box::new(FixedClock::at_millis(1_700_000_000_000)))
        .with_remote(Box::new(client(&server)));
    let result = engine.run("scores over 50", &rows, &schema);

    assert_eq!(result.total_count, 1);
    assert_eq!(result.confidence, 0.93);
    assert_eq!(result.insights[0].title, "One");
}

#[test]
fn server_error_falls_back_to_keywords() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(500).body("upstream exploded");
    });

    let (rows, schema) = dataset();
    let remote = client(&server);
    let interpretation = Interpreter::new(Some(&remote)).interpret("show active users", &rows, &schema);

    assert_eq!(interpretation.source, InterpretationSource::Fallback);
    assert_eq!(interpretation.confidence, 0.75);
    assert_eq!(interpretation.instruction.filters.len(), 1);
}
