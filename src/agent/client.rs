//! Vendor agent client abstraction
//!
//! [`AgentClient`] mirrors the lifecycle of the agent SDK client the gateway
//! drives: `connect`, fire-and-forget `query`, then one of two message
//! streams, then `disconnect`. [`AgentClientFactory`] builds a client per
//! conversation turn from [`AgentOptions`], which lets handlers be exercised
//! against scripted clients in tests.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::agent::types::AgentMessage;
use crate::error::Result;

/// Stream of decoded vendor messages
///
/// An `Err` item is terminal for the stream it appears in.
pub type MessageStream<'a> = Pin<Box<dyn Stream<Item = Result<AgentMessage>> + Send + 'a>>;

/// Connection descriptor for an auxiliary tool server
///
/// Serialized in the shape the agent CLI expects under `mcpServers`.
///
/// # Examples
///
/// ```
/// use agentgate::agent::ToolServerConfig;
///
/// let yaml = "command: npx\nargs: [\"-y\", \"@modelcontextprotocol/server-sequential-thinking\"]\n";
/// let server: ToolServerConfig = serde_yaml::from_str(yaml).unwrap();
/// assert!(matches!(server, ToolServerConfig::Stdio { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolServerConfig {
    /// Server reached over HTTP or SSE
    Remote {
        /// Transport kind (`http` or `sse`)
        #[serde(rename = "type")]
        transport: RemoteTransport,
        /// Server endpoint
        url: url::Url,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
    /// Server launched as a child process speaking over stdio
    Stdio {
        /// Executable to run
        command: String,
        /// Command-line arguments
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        /// Extra environment variables
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
    },
}

/// Remote tool server transport kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteTransport {
    /// Streamable HTTP
    Http,
    /// Legacy HTTP+SSE
    Sse,
}

/// Per-turn configuration handed to the vendor client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOptions {
    /// Working directory scoping the agent's file tools
    pub cwd: Option<String>,
    /// System prompt
    pub system_prompt: Option<String>,
    /// Tool names the agent may use without asking
    pub allowed_tools: Vec<String>,
    /// Session id to resume, if continuing a conversation
    pub resume: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Named auxiliary tool servers
    pub tool_servers: BTreeMap<String, ToolServerConfig>,
}

impl AgentOptions {
    /// Set the session to resume
    pub fn with_resume(mut self, session_id: Option<String>) -> Self {
        self.resume = session_id;
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// A connected conversation with the vendor agent
#[async_trait]
pub trait AgentClient: Send {
    /// Start the underlying agent session
    ///
    /// # Errors
    ///
    /// Returns an error if the agent process cannot be started.
    async fn connect(&mut self) -> Result<()>;

    /// Submit a prompt; the answer arrives on the message streams
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not connected or the prompt cannot
    /// be delivered.
    async fn query(&mut self, prompt: &str) -> Result<()>;

    /// Raw message stream; does not stop at the result message
    fn receive_messages(&mut self) -> MessageStream<'_>;

    /// Message stream that ends after yielding the result message
    fn receive_response(&mut self) -> MessageStream<'_> {
        // Ends without polling past the result: the agent may sit idle
        // waiting for the next prompt.
        let messages = self.receive_messages();
        Box::pin(futures::stream::unfold(
            (messages, false),
            |(mut messages, finished)| async move {
                if finished {
                    return None;
                }
                let item = messages.next().await?;
                let finished = item.is_err() || matches!(&item, Ok(msg) if msg.is_result());
                Some((item, (messages, finished)))
            },
        ))
    }

    /// Shut the agent session down
    ///
    /// # Errors
    ///
    /// Returns an error if the agent process exits abnormally.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Builds one [`AgentClient`] per conversation turn
pub trait AgentClientFactory: Send + Sync {
    /// Create an unconnected client for `options`
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient>;
}
