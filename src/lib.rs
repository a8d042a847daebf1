//! AgentGate - OpenAI-compatible gateway for a stream-json agent CLI
//!
//! This library drives an agent CLI as a subprocess, translates its message
//! stream into OpenAI chat-completion responses, and keeps per-conversation
//! session records so later turns resume the same agent session.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Agent message model, the client trait and the subprocess client
//! - `openai`: OpenAI wire types and the agent-to-OpenAI stream translator
//! - `session`: File-backed session store keyed by conversation
//! - `server`: axum router and handlers for the HTTP gateway
//! - `commands`: Handlers for the CLI subcommands
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use agentgate::session::SessionStore;
//! use agentgate::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = SessionStore::new(config.sessions.resolve_dir()?);
//!     store.save("current", "sess-123", None).await?;
//!     assert_eq!(store.load("current").await.map(|(id, _)| id), Some("sess-123".into()));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod openai;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use error::{AgentGateError, Result};
pub use session::SessionStore;
