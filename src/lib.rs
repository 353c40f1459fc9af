//! # toolrunner
//!
//! toolrunner is a runtime that executes a declarative set of "tool"
//! definitions against a remote HTTP API, and orchestrates composite tools —
//! tools that must call several atomic tools in a data-dependent sequence —
//! using a function-calling LLM as the sequencing brain.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Declarative Tools**: [`config::ToolsConfig`] loads and validates a
//!   JSON tools document describing atomic tools (1:1 endpoint mappings) and
//!   composite tools (LLM-orchestrated workflows)
//! * **Request Construction**: [`request::RequestBuilder`] turns a tool
//!   definition plus arguments into a concrete HTTP request with
//!   verb-appropriate argument placement
//! * **Normalized Dispatch**: [`dispatcher::Dispatcher`] executes requests
//!   and folds every failure mode into a uniform textual result — it never
//!   raises
//! * **Bounded Orchestration**: [`orchestrator::Orchestrator`] drives a
//!   hard-capped agent loop over LLM stop reasons with tool-call correlation
//!   and progress reporting under partial failure
//! * **The Façade**: [`ToolServer`] exposes the two-operation list/call
//!   contract the consuming tool-invocation protocol layer expects
//!
//! ## Core Concepts
//!
//! ### Loading a Tool Set
//!
//! ```rust,no_run
//! use std::path::Path;
//! use toolrunner::config::ToolsConfig;
//! use toolrunner::ToolServer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ToolsConfig::load(Path::new("tools.json"))?;
//! let server = ToolServer::new(config);
//!
//! for tool in server.list_tools() {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Invoking Tools
//!
//! ```rust,no_run
//! use std::path::Path;
//! use toolrunner::config::ToolsConfig;
//! use toolrunner::ToolServer;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ToolsConfig::load(Path::new("tools.json"))?;
//! let server = ToolServer::new(config);
//!
//! let args = serde_json::json!({"id": "42"}).as_object().unwrap().clone();
//! let blocks = server.call_tool("get_widget", &args).await?;
//! println!("{}", blocks[0]);
//! # Ok(())
//! # }
//! ```
//!
//! Atomic invocations go straight through the request builder and the
//! dispatcher. Composite invocations hand control to the orchestrator, which
//! exchanges up to 20 rounds with the model, executes the atomic calls it
//! requests, and feeds the results back — the final answer carries a
//! progress log of every step taken.
//!
//! ### Testing Orchestration Without a Provider
//!
//! The LLM is behind the [`llm::AgentClient`] trait. Construct the server
//! with [`ToolServer::with_agent_client`] and a scripted implementation to
//! exercise the full loop — iteration bounds, correlation, partial failure —
//! without any network access.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Embedding applications can opt in to `RUST_LOG` driven diagnostics
/// without committing to a logging backend themselves.
///
/// ```rust
/// toolrunner::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod toolrunner;

// Re-exports so callers don't have to write toolrunner::toolrunner::...
pub use toolrunner::config;
pub use toolrunner::dispatcher;
pub use toolrunner::error;
pub use toolrunner::llm;
pub use toolrunner::orchestrator;
pub use toolrunner::progress;
pub use toolrunner::request;
pub use toolrunner::server;
pub use toolrunner::ToolServer;
