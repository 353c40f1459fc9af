//! The tool server façade: enumerate tools, invoke one by name.
//!
//! [`ToolServer`] is the single entry point the protocol layer talks to. It
//! exposes exactly two operations — [`ToolServer::list_tools`] and
//! [`ToolServer::call_tool`] — and routes invocations to the request
//! builder + dispatcher for atomic tools or to the orchestrator for
//! composite tools.
//!
//! ```text
//! call_tool(name, args)
//!     │ lookup in ToolsConfig
//!     ├─ atomic    → RequestBuilder → Dispatcher ───────────┐
//!     ├─ composite → Orchestrator (loops over the same      ├─► text blocks
//!     │              builder/dispatcher per LLM request) ───┘   + progress
//!     └─ unknown   → ServerError::UnknownTool
//! ```
//!
//! Every invocation owns a fresh [`ExecutionContext`]; its progress summary
//! is merged into the first text block of the result and the context is
//! discarded afterwards regardless of success or failure.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::toolrunner::config::ToolsConfig;
use crate::toolrunner::dispatcher::Dispatcher;
use crate::toolrunner::error::ServerError;
use crate::toolrunner::llm::{AgentClient, AnthropicClient, ToolDescriptor};
use crate::toolrunner::orchestrator::Orchestrator;
use crate::toolrunner::progress::ExecutionContext;
use crate::toolrunner::request::RequestBuilder;

/// Façade over the loaded tool set. Cheap to share: all per-invocation state
/// lives in the [`ExecutionContext`] created inside [`ToolServer::call_tool`].
pub struct ToolServer {
    config: Arc<ToolsConfig>,
    builder: RequestBuilder,
    dispatcher: Dispatcher,
    orchestrator: Orchestrator,
}

impl ToolServer {
    /// Build a server from a loaded configuration, wiring the Anthropic
    /// client when a credential is present.
    pub fn new(config: ToolsConfig) -> Self {
        let agent_client: Option<Arc<dyn AgentClient>> = if config.anthropic_api_key.is_empty() {
            None
        } else {
            Some(Arc::new(AnthropicClient::new(&config.anthropic_api_key)))
        };
        Self::with_agent_client(config, agent_client)
    }

    /// Build a server with an explicit [`AgentClient`] (or none) — the seam
    /// tests use to drive orchestration with a scripted fake.
    pub fn with_agent_client(
        config: ToolsConfig,
        agent_client: Option<Arc<dyn AgentClient>>,
    ) -> Self {
        log::info!("Starting server for API: {}", config.api_name);
        log::info!("Base URL: {}", config.base_url);
        log::info!(
            "Standard tools: {} | Composite tools: {}",
            config.tools.len(),
            config.composite_tools.len()
        );
        if !config.composite_tools.is_empty() {
            if agent_client.is_some() {
                log::info!("ANTHROPIC_API_KEY is configured - composite tools enabled");
            } else {
                log::warn!(
                    "Composite tools found but ANTHROPIC_API_KEY not set - they may not work correctly"
                );
            }
        }

        let builder = RequestBuilder::new(config.base_url.clone(), config.api_key.clone());
        let dispatcher = Dispatcher::new(&config.base_url);
        let orchestrator = Orchestrator::new(agent_client);

        ToolServer {
            config: Arc::new(config),
            builder,
            dispatcher,
            orchestrator,
        }
    }

    /// Descriptors for every available tool: atomic tools first, then
    /// composite tools, each in configuration-load order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.config
            .tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .chain(self.config.composite_tools.iter().map(|t| ToolDescriptor {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            }))
            .collect()
    }

    /// Invoke a tool by name with the given arguments.
    ///
    /// Returns the result as a sequence of text blocks — the shape the
    /// consuming tool-invocation protocol expects. The invocation's progress
    /// summary, if any, is prepended to the first block.
    ///
    /// # Errors
    ///
    /// [`ServerError::UnknownTool`] when `name` matches neither an atomic
    /// nor a composite tool. All failures *inside* a known tool's execution
    /// are reported as result text instead.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Vec<String>, ServerError> {
        let mut ctx = ExecutionContext::new();

        let mut blocks = if let Some(atomic) = self.config.find_atomic(name) {
            log::debug!("Invoking atomic tool '{}'", name);
            let result = self.dispatcher.call(&self.builder, atomic, arguments).await;
            vec![result.render()]
        } else if let Some(composite) = self.config.find_composite(name) {
            log::debug!("Invoking composite tool '{}'", name);
            let result = self
                .orchestrator
                .execute_composite(
                    composite,
                    arguments,
                    &self.config.tools,
                    &self.builder,
                    &self.dispatcher,
                    &mut ctx,
                )
                .await;
            vec![result]
        } else {
            log::warn!("Rejected call to unknown tool '{}'", name);
            return Err(ServerError::UnknownTool(name.to_string()));
        };

        let summary = ctx.progress_summary();
        if !summary.is_empty() {
            if let Some(first) = blocks.first_mut() {
                *first = format!("{}{}", summary, first);
            }
        }

        // ctx is dropped here; nothing about this invocation outlives the call.
        Ok(blocks)
    }

    /// The immutable configuration backing this server.
    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolrunner::config::EnvConfig;

    fn config_with_both_kinds() -> ToolsConfig {
        let doc = r#"{
            "api_name": "widgets",
            "base_url": "http://127.0.0.1:1",
            "tools": [
                {"name": "get_widget", "description": "Fetch one widget",
                 "endpoint_mapping": {"method": "GET", "path": "/widgets/{id}"}},
                {"name": "list_widgets", "description": "List widgets",
                 "endpoint_mapping": {"method": "GET", "path": "/widgets"}}
            ],
            "composite_tools": [
                {"name": "widget_report", "description": "Cross-widget report"}
            ]
        }"#;
        ToolsConfig::from_document_str(doc, EnvConfig::default()).unwrap()
    }

    #[test]
    fn test_list_tools_order_atomic_then_composite() {
        let server = ToolServer::with_agent_client(config_with_both_kinds(), None);
        let names: Vec<String> = server.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["get_widget", "list_widgets", "widget_report"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_caller_error() {
        let server = ToolServer::with_agent_client(config_with_both_kinds(), None);
        let err = server.call_tool("nonexistent", &Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: nonexistent");
    }

    #[tokio::test]
    async fn test_composite_without_credential_reports_and_skips_remote() {
        // base_url points at a closed port: if this invocation issued any
        // remote call the result would contain transport-error text instead
        // of the credential message.
        let server = ToolServer::with_agent_client(config_with_both_kinds(), None);
        let blocks = server.call_tool("widget_report", &Map::new()).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("ANTHROPIC_API_KEY"));
        assert!(!blocks[0].contains("Status:"));
        // The credential failure itself is audited.
        assert!(blocks[0].contains("--- Progress Log ---"));
    }

    #[tokio::test]
    async fn test_atomic_transport_failure_is_text_not_error() {
        let server = ToolServer::with_agent_client(config_with_both_kinds(), None);
        let args = serde_json::json!({"id": "42"}).as_object().unwrap().clone();
        let blocks = server.call_tool("get_widget", &args).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("Error: "));
    }
}
