//! Error types for the tool runtime.
//!
//! Two families exist on purpose: [`ConfigError`] is fatal at startup (the
//! process must not come up with a broken tool set), while [`ServerError`]
//! covers caller mistakes surfaced per-request. Everything that happens
//! *inside* a tool invocation — downstream HTTP failures, transport errors,
//! orchestration dead-ends — is rendered as result text instead, because the
//! consuming protocol layer has no structured error channel beyond text
//! content.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Fatal configuration problems detected while loading the tools document.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The tools configuration file does not exist at the resolved path.
    NotFound(PathBuf),
    /// The file could not be read.
    Io(String),
    /// The document is not valid JSON or is missing a required field
    /// (e.g. `api_name`).
    Invalid(String),
    /// The same tool name appears more than once across the atomic and
    /// composite sets. Names must be unique because `call_tool` routes by
    /// name alone.
    DuplicateToolName(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(path) => {
                write!(f, "Tools configuration file not found: {}", path.display())
            }
            ConfigError::Io(msg) => write!(f, "Failed to read tools configuration: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid tools configuration: {}", msg),
            ConfigError::DuplicateToolName(name) => {
                write!(f, "Duplicate tool name in configuration: {}", name)
            }
        }
    }
}

impl Error for ConfigError {}

/// Per-request errors surfaced to the caller of the [`ToolServer`] façade.
///
/// [`ToolServer`]: crate::server::ToolServer
#[derive(Debug, Clone)]
pub enum ServerError {
    /// The requested tool name is not present in the registry. The caller is
    /// told so; the server keeps serving other requests.
    UnknownTool(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
        }
    }
}

impl Error for ServerError {}
