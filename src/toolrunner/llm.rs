//! LLM function-calling seam and the Anthropic Messages API client.
//!
//! The orchestration loop never talks to a provider directly. It sees one
//! narrow interface — [`AgentClient::send_turn`] — which takes a system
//! prompt, the accumulated message history, and the callable-function
//! descriptors, and yields an [`AgentTurn`]: either a terminal text answer
//! or a batch of requested tool calls, each carrying the opaque correlation
//! id that must be echoed back with its result. That seam is what makes the
//! bounded loop and its termination conditions unit-testable with a scripted
//! fake, fully decoupled from any real network call.
//!
//! [`AnthropicClient`] is the production implementation, speaking the
//! Messages API (`tools` array, `stop_reason`, `tool_use`/`tool_result`
//! content blocks).

use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default model used for orchestration when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";
/// Messages API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Completion budget per loop exchange.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A callable-function descriptor handed to the model (and also the shape
/// `list_tools` exposes to the protocol layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Role of one history entry. The orchestration history strictly alternates
/// assistant turns with user-role tool feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One content block inside a message, mirroring the Messages API wire
/// shapes the loop needs: plain text, a model-requested call, and the echoed
/// result for a previous call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// One entry of the conversation history exchanged with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// A user-role message holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant message carrying the model's raw content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content,
        }
    }

    /// A user-role message carrying a batch of tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: results,
        }
    }
}

/// A single call the model asked for, with its correlation id.
#[derive(Debug, Clone)]
pub struct RequestedCall {
    /// Opaque correlation id; must appear exactly once in the next turn's
    /// tool-result feedback.
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// One round of the orchestration loop as seen from the model side.
#[derive(Debug, Clone)]
pub enum AgentTurn {
    /// Terminal: the model produced its final answer (all text fragments
    /// concatenated).
    FinalAnswer(String),
    /// The model requested one or more atomic calls. `assistant_content`
    /// carries the raw blocks so the loop can append them to history before
    /// echoing results.
    ToolCalls {
        assistant_content: Vec<ContentBlock>,
        calls: Vec<RequestedCall>,
    },
    /// The response matched neither terminal-answer nor tool-call shape;
    /// `stop_reason` is reported verbatim.
    Unexpected { stop_reason: String },
}

/// The narrow interface between the orchestration loop and a
/// function-calling LLM.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Exchange one request/response round with the model.
    async fn send_turn(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<AgentTurn, Box<dyn Error + Send + Sync>>;

    /// Model identifier, for progress reporting.
    fn model_name(&self) -> &str;
}

// ---- Anthropic Messages API implementation ----

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDescriptor],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Production [`AgentClient`] speaking Anthropic's Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a client for the default model against the public API.
    pub fn new(api_key: &str) -> Self {
        Self::new_with_model_str(api_key, DEFAULT_MODEL)
    }

    /// Create a client with an explicit model string.
    pub fn new_with_model_str(api_key: &str, model: &str) -> Self {
        Self::new_with_base_url(api_key, model, "https://api.anthropic.com")
    }

    /// Create a client pointing at a custom Messages-API-compatible base
    /// URL. Used by tests and proxy deployments.
    pub fn new_with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        AnthropicClient {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the per-exchange completion budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl AgentClient for AnthropicClient {
    async fn send_turn(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<AgentTurn, Box<dyn Error + Send + Sync>> {
        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: history,
            tools,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("LLM request failed: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read LLM response: {}", e))?;

        if !status.is_success() {
            return Err(format!("LLM provider returned {}: {}", status.as_u16(), body).into());
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to decode LLM response: {}", e))?;

        Ok(response_to_turn(parsed))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a decoded Messages API response onto the loop's state machine input.
fn response_to_turn(response: MessagesResponse) -> AgentTurn {
    let stop_reason = response.stop_reason.as_deref().unwrap_or("end_turn");

    match stop_reason {
        "end_turn" => {
            let mut final_text = String::new();
            for block in &response.content {
                if let ContentBlock::Text { text } = block {
                    final_text.push_str(text);
                }
            }
            AgentTurn::FinalAnswer(final_text)
        }
        "tool_use" => {
            let calls: Vec<RequestedCall> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some(RequestedCall {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                // stop_reason claimed tool_use but no tool_use block came
                // with it; report the inconsistency instead of looping.
                return AgentTurn::Unexpected {
                    stop_reason: "tool_use (without tool_use content)".to_string(),
                };
            }

            AgentTurn::ToolCalls {
                assistant_content: response.content,
                calls,
            }
        }
        other => AgentTurn::Unexpected {
            stop_reason: other.to_string(),
        },
    }
}
