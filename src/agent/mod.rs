//! Vendor agent layer
//!
//! This module contains the message types decoded from the agent CLI, the
//! client trait the gateway drives per conversation turn, and the
//! subprocess-backed implementation of that trait.

pub mod client;
pub mod subprocess;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use client::{
    AgentClient, AgentClientFactory, AgentOptions, MessageStream, RemoteTransport,
    ToolServerConfig,
};
pub use subprocess::{SubprocessClient, SubprocessFactory};
pub use types::{AgentMessage, AssistantMessage, ContentBlock, ResultMessage, Usage};
