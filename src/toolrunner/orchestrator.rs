//! LLM-driven orchestration of composite tools.
//!
//! A composite tool is executed by handing the sequencing decisions to a
//! function-calling model inside a bounded agent loop:
//!
//! ```text
//! AWAIT_MODEL ──► FinalAnswer ──► terminal (success)
//!      ▲     └──► ToolCalls  ──► execute batch, echo results ──┐
//!      │     └──► Unexpected ──► terminal (error)              │
//!      └───────────────────────────────────────────────────────┘
//! ```
//!
//! The loop is hard-capped at [`MAX_ITERATIONS`] exchanges; hitting the cap
//! is an explicit, reported error, never silently truncated output. Atomic
//! call failures never abort the run — they flow back to the model as error
//! tool-results so it can adapt. Every meaningful event is recorded in the
//! invocation's [`ExecutionContext`] so the final answer carries an audit
//! trail.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::toolrunner::config::{AtomicTool, CompositeTool};
use crate::toolrunner::dispatcher::Dispatcher;
use crate::toolrunner::llm::{
    AgentClient, AgentTurn, ChatMessage, ContentBlock, ToolDescriptor,
};
use crate::toolrunner::progress::ExecutionContext;
use crate::toolrunner::request::RequestBuilder;

/// Hard ceiling on request/response exchanges per composite invocation.
pub const MAX_ITERATIONS: usize = 20;

/// Longest result preview recorded in the progress log. Only the preview is
/// truncated — the model always receives the full result text.
const RESULT_PREVIEW_CHARS: usize = 150;

/// Drives the bounded agent loop for composite tools.
pub struct Orchestrator {
    /// `None` when no LLM credential is configured; composite execution is
    /// then a terminal, user-visible error rather than a crash.
    client: Option<Arc<dyn AgentClient>>,
}

impl Orchestrator {
    pub fn new(client: Option<Arc<dyn AgentClient>>) -> Self {
        Orchestrator { client }
    }

    /// Whether composite execution is possible at all.
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Execute one composite tool invocation to completion.
    ///
    /// Always returns text: the final model answer on success, or a
    /// human-readable error description for every terminal failure mode
    /// (missing credential, transport failure, unexpected model state,
    /// iteration exhaustion). The caller merges the progress summary in.
    pub async fn execute_composite(
        &self,
        tool: &CompositeTool,
        arguments: &Map<String, Value>,
        atomic_tools: &[AtomicTool],
        builder: &RequestBuilder,
        dispatcher: &Dispatcher,
        ctx: &mut ExecutionContext,
    ) -> String {
        let client = match &self.client {
            Some(client) => client,
            None => {
                let message = "Error: Composite tools require ANTHROPIC_API_KEY to be set. \
                               This tool orchestrates multiple tool calls using an LLM agent.";
                ctx.record(message);
                return message.to_string();
            }
        };

        ctx.record(format!("Starting composite tool: {}", tool.name));
        ctx.record(format!("Use case: {}", tool.use_case_description));
        ctx.record(format!(
            "Orchestration strategy: {}",
            truncate_preview(&tool.orchestration_logic, 100)
        ));

        let descriptors: Vec<ToolDescriptor> = atomic_tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        let system_prompt = build_system_prompt(tool, arguments, &descriptors);

        log::info!(
            "Starting orchestration for '{}' with model {}",
            tool.name,
            client.model_name()
        );
        ctx.record(format!(
            "Initializing orchestration agent ({})",
            client.model_name()
        ));

        let mut history: Vec<ChatMessage> =
            vec![ChatMessage::user_text("Execute the workflow using the available tools.")];

        for iteration in 1..=MAX_ITERATIONS {
            ctx.record(format!("Agent iteration {}/{}", iteration, MAX_ITERATIONS));
            log::debug!("Agent iteration {}/{}", iteration, MAX_ITERATIONS);

            let turn = match client.send_turn(&system_prompt, &history, &descriptors).await {
                Ok(turn) => turn,
                Err(e) => {
                    let message = format!("Orchestration error: {}", e);
                    ctx.record(message.clone());
                    log::error!("Orchestration for '{}' failed: {}", tool.name, e);
                    return message;
                }
            };

            match turn {
                AgentTurn::FinalAnswer(text) => {
                    ctx.record(format!(
                        "Orchestration completed successfully in {} iterations",
                        iteration
                    ));
                    log::info!(
                        "Orchestration for '{}' completed in {} iterations",
                        tool.name,
                        iteration
                    );
                    return text;
                }
                AgentTurn::ToolCalls {
                    assistant_content,
                    calls,
                } => {
                    history.push(ChatMessage::assistant(assistant_content));

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(
                            self.execute_requested_call(
                                call.id.clone(),
                                &call.name,
                                &call.input,
                                atomic_tools,
                                builder,
                                dispatcher,
                                ctx,
                            )
                            .await,
                        );
                    }
                    history.push(ChatMessage::tool_results(results));
                }
                AgentTurn::Unexpected { stop_reason } => {
                    let message =
                        format!("Orchestration stopped unexpectedly: {}", stop_reason);
                    ctx.record(message.clone());
                    log::warn!("Orchestration for '{}': {}", tool.name, message);
                    return message;
                }
            }
        }

        let message = format!(
            "Orchestration failed: Maximum iterations ({}) reached without completion",
            MAX_ITERATIONS
        );
        ctx.record(message.clone());
        log::warn!("Orchestration for '{}': {}", tool.name, message);
        message
    }

    /// Execute one model-requested call and wrap its outcome as the
    /// tool-result block echoing the correlation id. Calls within a batch
    /// run sequentially: later calls routinely depend on values the model
    /// extracts from earlier results.
    #[allow(clippy::too_many_arguments)]
    async fn execute_requested_call(
        &self,
        correlation_id: String,
        name: &str,
        input: &Value,
        atomic_tools: &[AtomicTool],
        builder: &RequestBuilder,
        dispatcher: &Dispatcher,
        ctx: &mut ExecutionContext,
    ) -> ContentBlock {
        let Some(atomic) = atomic_tools.iter().find(|t| t.name == name) else {
            let message = format!("Error: tool {} not found", name);
            ctx.record(message.clone());
            return ContentBlock::ToolResult {
                tool_use_id: correlation_id,
                content: message,
                is_error: true,
            };
        };

        ctx.record(format!("Calling: {}({})", name, compact_json(input)));

        let arguments = input.as_object().cloned().unwrap_or_default();
        let result_text = dispatcher.call(builder, atomic, &arguments).await.render();

        ctx.record(format!(
            "Result from {}: {}",
            name,
            truncate_preview(&result_text, RESULT_PREVIEW_CHARS)
        ));

        // The model gets the full result text, never the preview.
        ContentBlock::ToolResult {
            tool_use_id: correlation_id,
            content: result_text,
            is_error: false,
        }
    }
}

/// Build the system prompt describing the composite tool's task, its
/// guidance text, and the callable atomic tools.
fn build_system_prompt(
    tool: &CompositeTool,
    arguments: &Map<String, Value>,
    descriptors: &[ToolDescriptor],
) -> String {
    let tools_json = serde_json::to_string_pretty(descriptors)
        .unwrap_or_else(|_| "[]".to_string());
    let user_input = serde_json::to_string(&Value::Object(arguments.clone()))
        .unwrap_or_else(|_| "{}".to_string());

    let mut endpoints_section = String::new();
    if !tool.endpoint_mappings.is_empty() {
        endpoints_section.push_str("\nENDPOINTS INVOLVED (advisory, not a mandatory order):\n");
        for endpoint in &tool.endpoint_mappings {
            endpoints_section.push_str(&format!(
                "- {} {}: {}\n",
                endpoint.method, endpoint.path, endpoint.purpose
            ));
        }
    }

    format!(
        "You are an orchestration agent. Your job is to execute a complex workflow by \
         calling multiple tools in the correct order and combining their results.\n\n\
         TASK: {description}\n\n\
         USE CASE: {use_case}\n\n\
         ORCHESTRATION LOGIC: {logic}\n{endpoints}\n\
         AVAILABLE TOOLS: You have access to the following tools (these call the actual API):\n\
         {tools}\n\n\
         INSTRUCTIONS:\n\
         1. Call the tools in the correct order based on the orchestration logic\n\
         2. Extract data from responses to use in subsequent calls (e.g., IDs, values)\n\
         3. Handle data flow between calls properly\n\
         4. Aggregate and combine results as needed\n\
         5. Return a final consolidated response\n\n\
         USER INPUT: {input}\n\n\
         Execute the workflow step by step, calling tools as needed.",
        description = tool.description,
        use_case = tool.use_case_description,
        logic = tool.orchestration_logic,
        endpoints = endpoints_section,
        tools = tools_json,
        input = user_input,
    )
}

/// Compact JSON rendering for progress lines.
fn compact_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Truncate to at most `max_chars` characters on a char boundary, appending
/// an ellipsis when anything was cut.
fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn composite() -> CompositeTool {
        serde_json::from_value(json!({
            "name": "widget_report",
            "description": "Build a report across widgets",
            "use_case_description": "Summarize a widget and its tags",
            "orchestration_logic": "Fetch the widget first, then use the returned id for the tag lookup.",
            "endpoint_mappings": [
                {"path": "/widgets/{id}", "method": "GET", "purpose": "fetch the widget"},
                {"path": "/widgets/{id}/tags", "method": "GET", "purpose": "fetch its tags"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_system_prompt_embeds_tool_context() {
        let descriptors = vec![ToolDescriptor {
            name: "get_widget".to_string(),
            description: "Fetch one widget".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let arguments = json!({"id": "42"}).as_object().unwrap().clone();

        let prompt = build_system_prompt(&composite(), &arguments, &descriptors);
        assert!(prompt.contains("Build a report across widgets"));
        assert!(prompt.contains("Summarize a widget and its tags"));
        assert!(prompt.contains("use the returned id"));
        assert!(prompt.contains("get_widget"));
        assert!(prompt.contains("fetch its tags"));
        assert!(prompt.contains(r#"USER INPUT: {"id":"42"}"#));
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        assert_eq!(truncate_preview("short", 100), "short");
        assert_eq!(truncate_preview("abcdef", 3), "abc...");
        // Multi-byte: must not panic on a non-boundary byte index.
        let cut = truncate_preview("ééééé", 3);
        assert_eq!(cut, "ééé...");
    }

    #[tokio::test]
    async fn test_missing_credential_is_terminal_text() {
        let orchestrator = Orchestrator::new(None);
        let builder = RequestBuilder::new("http://127.0.0.1:1", "");
        let dispatcher = Dispatcher::new("http://127.0.0.1:1");
        let mut ctx = ExecutionContext::new();

        let result = orchestrator
            .execute_composite(
                &composite(),
                &Map::new(),
                &[],
                &builder,
                &dispatcher,
                &mut ctx,
            )
            .await;

        assert!(result.contains("ANTHROPIC_API_KEY"));
        assert!(!ctx.is_empty());
    }
}
