//! End-to-end tests for the ToolServer façade against a minimal local HTTP
//! endpoint, plus a full composite run driven by a scripted AgentClient.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use toolrunner::config::{EnvConfig, ToolsConfig};
use toolrunner::llm::{
    AgentClient, AgentTurn, ChatMessage, ContentBlock, RequestedCall, ToolDescriptor,
};
use toolrunner::ToolServer;

/// Handler: (method, path, full request head) -> (status, JSON body).
type Handler = fn(&str, &str, &str) -> (u16, String);

/// Spawn a throwaway HTTP/1.1 endpoint on a random local port and return its
/// base URL. Each connection gets one request/response; good enough for
/// exercising the dispatcher for real without any additional dependency.
async fn spawn_api(handler: Handler) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                // Read until the end of the request head.
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).into_owned();
                let mut parts = head.split_whitespace();
                let method = parts.next().unwrap_or("").to_string();
                let path = parts.next().unwrap_or("").to_string();

                let (status, body) = handler(&method, &path, &head);
                let response = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    format!("http://{}", addr)
}

fn widget_config(base_url: &str, env: EnvConfig) -> ToolsConfig {
    let doc = json!({
        "api_name": "widgets",
        "base_url": base_url,
        "tools": [
            {"name": "get_widget", "description": "Fetch one widget",
             "input_schema": {"type": "object", "properties": {"id": {"type": "string"}}},
             "endpoint_mapping": {"method": "GET", "path": "/widgets/{id}"}},
            {"name": "get_tags", "description": "Fetch a widget's tags",
             "input_schema": {"type": "object", "properties": {"id": {"type": "string"}}},
             "endpoint_mapping": {"method": "GET", "path": "/widgets/{id}/tags"}}
        ],
        "composite_tools": [
            {"name": "widget_report",
             "description": "Cross-reference a widget with its tags",
             "use_case_description": "Widget overview in one call",
             "orchestration_logic": "Fetch the widget, then use the returned id for the tag call."}
        ]
    });
    ToolsConfig::from_document_str(&doc.to_string(), env).unwrap()
}

struct ScriptedClient {
    turns: Mutex<VecDeque<AgentTurn>>,
}

impl ScriptedClient {
    fn new(turns: Vec<AgentTurn>) -> Self {
        ScriptedClient {
            turns: Mutex::new(turns.into()),
        }
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    async fn send_turn(
        &self,
        _system_prompt: &str,
        _history: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<AgentTurn, Box<dyn Error + Send + Sync>> {
        match self.turns.lock().unwrap().pop_front() {
            Some(turn) => Ok(turn),
            None => Err("scripted client ran out of turns".into()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-fake"
    }
}

fn call(id: &str, name: &str, input: Value) -> AgentTurn {
    AgentTurn::ToolCalls {
        assistant_content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        }],
        calls: vec![RequestedCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
    }
}

fn widget_api(_method: &str, path: &str, _head: &str) -> (u16, String) {
    match path {
        "/widgets/42" => (200, json!({"id": "42", "name": "sprocket"}).to_string()),
        "/widgets/7" => (200, json!({"id": 7, "name": "w7"}).to_string()),
        "/widgets/7/tags" => (200, json!(["red", "blue"]).to_string()),
        _ => (404, json!({"error": "no such widget"}).to_string()),
    }
}

#[tokio::test]
async fn test_atomic_get_builds_clean_url_end_to_end() {
    // Substituted path args must not linger in the query string: this
    // handler routes strictly on the literal path `/widgets/42`.
    let base_url = spawn_api(widget_api).await;
    let server = ToolServer::with_agent_client(widget_config(&base_url, EnvConfig::default()), None);

    let args = json!({"id": "42"}).as_object().unwrap().clone();
    let blocks = server.call_tool("get_widget", &args).await.unwrap();

    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].starts_with("Status: 200"));
    assert!(blocks[0].contains("sprocket"));
}

#[tokio::test]
async fn test_atomic_http_error_is_recorded_not_raised() {
    let base_url = spawn_api(widget_api).await;
    let server = ToolServer::with_agent_client(widget_config(&base_url, EnvConfig::default()), None);

    let args = json!({"id": "999"}).as_object().unwrap().clone();
    let blocks = server.call_tool("get_widget", &args).await.unwrap();
    assert!(blocks[0].starts_with("Status: 404"));
    assert!(blocks[0].contains("no such widget"));
}

#[tokio::test]
async fn test_bearer_token_reaches_the_wire() {
    fn auth_api(_method: &str, _path: &str, head: &str) -> (u16, String) {
        if head.contains("Bearer sekrit") {
            (200, json!({"ok": true}).to_string())
        } else {
            (401, json!({"error": "unauthorized"}).to_string())
        }
    }

    let base_url = spawn_api(auth_api).await;
    let env = EnvConfig {
        api_key: "sekrit".to_string(),
        ..EnvConfig::default()
    };
    let server = ToolServer::with_agent_client(widget_config(&base_url, env), None);

    let args = json!({"id": "42"}).as_object().unwrap().clone();
    let blocks = server.call_tool("get_widget", &args).await.unwrap();
    assert!(blocks[0].starts_with("Status: 200"));
}

#[tokio::test]
async fn test_composite_two_call_flow_merges_data_and_progress() {
    // The scripted model performs exactly the sequence the orchestration
    // text describes: fetch widget 7, feed its id into the tag call, then
    // consolidate. Both atomic calls hit the real dispatcher.
    let base_url = spawn_api(widget_api).await;
    let client = Arc::new(ScriptedClient::new(vec![
        call("tu_1", "get_widget", json!({"id": "7"})),
        call("tu_2", "get_tags", json!({"id": "7"})),
        AgentTurn::FinalAnswer("Widget w7 carries tags red and blue.".to_string()),
    ]));
    let server =
        ToolServer::with_agent_client(widget_config(&base_url, EnvConfig::default()), Some(client));

    let blocks = server.call_tool("widget_report", &Map::new()).await.unwrap();
    assert_eq!(blocks.len(), 1);

    let output = &blocks[0];
    // Final model answer, preceded by a non-empty audit trail naming both calls.
    assert!(output.contains("Widget w7 carries tags red and blue."));
    assert!(output.contains("--- Progress Log ---"));
    assert!(output.contains("Calling: get_widget"));
    assert!(output.contains("Calling: get_tags"));
    assert!(output.contains("Result from get_widget: Status: 200"));
    assert!(output.contains("completed successfully in 3 iterations"));
}

#[tokio::test]
async fn test_progress_log_absent_for_plain_atomic_calls() {
    let base_url = spawn_api(widget_api).await;
    let server = ToolServer::with_agent_client(widget_config(&base_url, EnvConfig::default()), None);

    let args = json!({"id": "42"}).as_object().unwrap().clone();
    let blocks = server.call_tool("get_widget", &args).await.unwrap();
    assert!(!blocks[0].contains("--- Progress Log ---"));
}

#[tokio::test]
async fn test_list_tools_reports_schemas() {
    let base_url = spawn_api(widget_api).await;
    let server = ToolServer::with_agent_client(widget_config(&base_url, EnvConfig::default()), None);

    let tools = server.list_tools();
    assert_eq!(tools.len(), 3);
    assert_eq!(tools[0].name, "get_widget");
    assert_eq!(tools[2].name, "widget_report");
    assert_eq!(tools[0].input_schema["type"], "object");
}
