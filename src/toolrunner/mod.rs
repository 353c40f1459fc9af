// src/toolrunner/mod.rs

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod server;

// Explicitly export the façade so callers reach it as toolrunner::ToolServer
// instead of toolrunner::server::ToolServer.
pub use server::ToolServer;
