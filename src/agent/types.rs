//! Vendor agent message types
//!
//! The agent CLI emits one JSON object per line (`stream-json` output
//! format). Only two kinds of frame matter to the gateway: assistant
//! messages, which carry ordered content blocks, and the terminal result
//! message, which carries the resumable session id. Every other frame type
//! (`system`, `user`, `stream_event`, ...) is skipped by [`AgentMessage::from_line`].

use serde::{Deserialize, Serialize};

use crate::error::{AgentGateError, Result};

/// A single block of assistant content
///
/// Block types the gateway does not understand (for example `thinking`)
/// decode as [`ContentBlock::Unsupported`] instead of failing the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain assistant text
    Text {
        /// The text content
        text: String,
    },
    /// The assistant invoked a tool
    ToolUse {
        /// Tool call identifier
        id: String,
        /// Tool name (e.g. `Read`, `Bash`, `mcp__server__tool`)
        name: String,
        /// Tool input as raw JSON
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Output of a tool invocation
    ToolResult {
        /// Identifier of the tool call this result answers
        tool_use_id: String,
        /// Raw result content (string or block array)
        #[serde(default)]
        content: Option<serde_json::Value>,
        /// Whether the tool reported a failure
        #[serde(default)]
        is_error: Option<bool>,
    },
    /// Any block type not modelled above
    #[serde(other)]
    Unsupported,
}

/// Assistant message carrying ordered content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Ordered content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Model that produced the message, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Token usage reported on the result message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt-side tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion-side tokens
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    /// Sum of input and output tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Terminal message of one agent turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// Resumable session id
    pub session_id: String,
    /// Whether the turn ended in an error state
    #[serde(default)]
    pub is_error: bool,
    /// Number of agent turns taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    /// Wall-clock duration of the turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Reported cost of the turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Final result text as summarised by the agent CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// A message received from the vendor agent client
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Assistant content (text and tool blocks)
    Assistant(AssistantMessage),
    /// End of the turn, carrying the session id
    Result(ResultMessage),
}

impl AgentMessage {
    /// Build an assistant message holding a single text block
    ///
    /// # Examples
    ///
    /// ```
    /// use agentgate::agent::{AgentMessage, ContentBlock};
    ///
    /// let msg = AgentMessage::text("Hello");
    /// if let AgentMessage::Assistant(assistant) = msg {
    ///     assert_eq!(assistant.content, vec![ContentBlock::Text { text: "Hello".into() }]);
    /// }
    /// ```
    pub fn text(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage {
            content: vec![ContentBlock::Text { text: text.into() }],
            model: None,
        })
    }

    /// Build an assistant message from explicit blocks
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::Assistant(AssistantMessage {
            content,
            model: None,
        })
    }

    /// Build a successful result message with only a session id
    pub fn result(session_id: impl Into<String>) -> Self {
        Self::Result(ResultMessage {
            session_id: session_id.into(),
            is_error: false,
            num_turns: None,
            duration_ms: None,
            total_cost_usd: None,
            usage: None,
            result: None,
        })
    }

    /// Returns true for the terminal result message
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Decode one `stream-json` line
    ///
    /// Returns `Ok(None)` for blank lines and for frame types the gateway
    /// does not consume.
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Protocol`] if the line is not a JSON object
    /// or if an assistant/result frame is missing required fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentgate::agent::AgentMessage;
    ///
    /// let line = r#"{"type":"result","subtype":"success","session_id":"abc"}"#;
    /// let msg = AgentMessage::from_line(line).unwrap().unwrap();
    /// assert!(msg.is_result());
    ///
    /// let system = r#"{"type":"system","subtype":"init"}"#;
    /// assert!(AgentMessage::from_line(system).unwrap().is_none());
    /// ```
    pub fn from_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| AgentGateError::Protocol(format!("invalid JSON line: {}", e)))?;

        let frame_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| AgentGateError::Protocol("frame has no `type` field".to_string()))?;

        match frame_type {
            "assistant" => {
                let message = value.get("message").cloned().ok_or_else(|| {
                    AgentGateError::Protocol("assistant frame has no `message`".to_string())
                })?;
                let assistant: AssistantMessage = serde_json::from_value(message).map_err(|e| {
                    AgentGateError::Protocol(format!("malformed assistant message: {}", e))
                })?;
                Ok(Some(Self::Assistant(assistant)))
            }
            "result" => {
                let result: ResultMessage = serde_json::from_value(value).map_err(|e| {
                    AgentGateError::Protocol(format!("malformed result message: {}", e))
                })?;
                Ok(Some(Self::Result(result)))
            }
            other => {
                tracing::trace!(frame_type = other, "skipping agent frame");
                Ok(None)
            }
        }
    }
}
