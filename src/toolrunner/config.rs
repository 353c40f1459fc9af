//! Tool configuration loading and validation.
//!
//! The runtime is driven entirely by a JSON tools document: a set of atomic
//! tool definitions (each mapping 1:1 to an HTTP endpoint) plus an optional
//! set of composite tools (each orchestrated across several atomic calls by
//! an LLM). The document is loaded once at startup, validated eagerly, and
//! never mutated afterwards — everything downstream holds it behind an `Arc`
//! and reads it without locking.
//!
//! Loose shapes are rejected here rather than deep inside request
//! construction: a missing `api_name` or a duplicate tool name fails the
//! load with a precise [`ConfigError`](crate::error::ConfigError) instead of
//! surfacing as a confusing runtime fault later.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use toolrunner::config::ToolsConfig;
//!
//! let config = ToolsConfig::load(Path::new("tools.json"))?;
//! println!("API: {} ({} atomic, {} composite)",
//!     config.api_name, config.tools.len(), config.composite_tools.len());
//! # Ok::<(), toolrunner::error::ConfigError>(())
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::toolrunner::error::ConfigError;

/// Environment variable holding the bearer token for the target API.
pub const API_KEY_ENV: &str = "API_KEY";
/// Environment variable holding the Anthropic credential used by composite
/// tool orchestration.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Environment variable pointing at the tools configuration document.
pub const TOOLS_CONFIG_PATH_ENV: &str = "TOOLS_CONFIG_PATH";

/// How a single atomic tool maps onto the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMapping {
    /// HTTP verb, e.g. `"GET"` or `"post"`. Case-insensitive at build time.
    pub method: String,
    /// Endpoint path, possibly containing `{name}` placeholders that are
    /// substituted from call arguments.
    pub path: String,
}

/// A tool definition that maps 1:1 to a single HTTP endpoint call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicTool {
    /// Unique, stable identifier used for routing `call_tool` requests.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON-Schema-like object describing accepted arguments.
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    pub endpoint_mapping: EndpointMapping,
}

/// One advisory endpoint entry of a composite tool.
///
/// The listed order is informational only — the authoritative call order is
/// whatever the orchestrating LLM actually requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeEndpoint {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub purpose: String,
}

/// A tool whose execution requires a model-directed sequence of atomic tool
/// calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeTool {
    /// Unique, stable identifier (shares a namespace with atomic tools).
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub use_case_description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    /// Free-text plan consumed only by the LLM as guidance, never executed
    /// mechanically.
    #[serde(default)]
    pub orchestration_logic: String,
    #[serde(default)]
    pub endpoint_mappings: Vec<CompositeEndpoint>,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Raw shape of the tools document on disk. `api_name` is the only required
/// field; absent tool arrays default to empty.
#[derive(Debug, Deserialize)]
struct ToolsDocument {
    api_name: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    tools: Vec<AtomicTool>,
    #[serde(default)]
    composite_tools: Vec<CompositeTool>,
}

/// Credentials and paths read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Bearer token for the target API, or empty when unset.
    pub api_key: String,
    /// Anthropic credential, or empty when unset. Only required when a
    /// composite tool is actually invoked.
    pub anthropic_api_key: String,
    /// Path to the tools document. Defaults to `tools.json`.
    pub tools_config_path: String,
}

impl EnvConfig {
    /// Read `API_KEY`, `ANTHROPIC_API_KEY` and `TOOLS_CONFIG_PATH` from the
    /// environment. Missing variables fall back to empty strings (and
    /// `tools.json` for the path) — presence is checked at the point of use.
    pub fn from_env() -> Self {
        EnvConfig {
            api_key: env::var(API_KEY_ENV).unwrap_or_default(),
            anthropic_api_key: env::var(ANTHROPIC_API_KEY_ENV).unwrap_or_default(),
            tools_config_path: env::var(TOOLS_CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "tools.json".to_string()),
        }
    }

    /// Resolve the configured tools path. Absolute paths are used as-is;
    /// relative ones are resolved against `base_dir`.
    pub fn resolve_config_path(&self, base_dir: &Path) -> PathBuf {
        let path = Path::new(&self.tools_config_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

/// The loaded, validated set of tool definitions plus API credentials.
///
/// Immutable for the process lifetime; there is deliberately no mutation
/// API. Concurrent invocations share it behind an `Arc` with no locking.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub api_name: String,
    pub base_url: String,
    pub tools: Vec<AtomicTool>,
    pub composite_tools: Vec<CompositeTool>,
    pub api_key: String,
    pub anthropic_api_key: String,
}

impl ToolsConfig {
    /// Load and validate the tools document at `path`, merging in
    /// credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing or unreadable, the
    /// JSON is malformed, `api_name` is absent, or a tool name is duplicated
    /// across the atomic and composite sets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, EnvConfig::from_env())
    }

    /// Like [`ToolsConfig::load`] but with explicit environment values —
    /// the seam used by tests to avoid process-global state.
    pub fn load_with_env(path: &Path, env_config: EnvConfig) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        log::info!("Loading tools config from: {}", path.display());

        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_document_str(&raw, env_config)
    }

    /// Parse and validate a tools document from an in-memory JSON string.
    pub fn from_document_str(raw: &str, env_config: EnvConfig) -> Result<Self, ConfigError> {
        let document: ToolsDocument =
            serde_json::from_str(raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut seen: HashSet<&str> = HashSet::new();
        for name in document
            .tools
            .iter()
            .map(|t| t.name.as_str())
            .chain(document.composite_tools.iter().map(|t| t.name.as_str()))
        {
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateToolName(name.to_string()));
            }
        }

        log::info!("Loaded config for API: {}", document.api_name);
        log::info!(
            "Standard tools: {} | Composite tools: {}",
            document.tools.len(),
            document.composite_tools.len()
        );

        Ok(ToolsConfig {
            api_name: document.api_name,
            base_url: document.base_url,
            tools: document.tools,
            composite_tools: document.composite_tools,
            api_key: env_config.api_key,
            anthropic_api_key: env_config.anthropic_api_key,
        })
    }

    /// Look up an atomic tool by name.
    pub fn find_atomic(&self, name: &str) -> Option<&AtomicTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Look up a composite tool by name.
    pub fn find_composite(&self, name: &str) -> Option<&CompositeTool> {
        self.composite_tools.iter().find(|t| t.name == name)
    }
}
