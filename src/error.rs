//! Error types for AgentGate
//!
//! This module defines the error taxonomy used throughout the gateway,
//! using `thiserror` for the domain enum and `anyhow` for propagation.

use thiserror::Error;

/// Main error type for AgentGate operations
///
/// Vendor-stream failures (`Agent`, `Protocol`) end a response stream with a
/// single error frame. Malformed session files never surface here: the
/// session store degrades them to "no record". `InvalidRequest` is raised
/// before any vendor call is made.
#[derive(Error, Debug)]
pub enum AgentGateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vendor agent client errors (spawn, connection, process exit)
    #[error("Agent error: {0}")]
    Agent(String),

    /// A line emitted by the agent CLI could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Session storage errors (directory creation, writes)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller supplied a request that cannot be served
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for AgentGate operations
///
/// Uses `anyhow::Error` so call sites can attach context while the
/// `AgentGateError` variants stay downcastable.
pub type Result<T> = anyhow::Result<T>;
