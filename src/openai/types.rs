//! OpenAI-compatible wire types
//!
//! Requests accept both plain-string and multimodal (array) message content.
//! Responses, streaming chunks and error envelopes serialize to the shapes
//! OpenAI clients parse.

use serde::{Deserialize, Serialize};

/// Model name reported when a request does not name one
pub const DEFAULT_MODEL: &str = "claude-sonnet-4";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// OpenAI-compatible chat completion request
///
/// # Examples
///
/// ```
/// use agentgate::openai::ChatCompletionRequest;
///
/// let body = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
/// let request: ChatCompletionRequest = serde_json::from_str(body).unwrap();
/// assert_eq!(request.model, "claude-sonnet-4");
/// assert!(!request.stream);
/// assert_eq!(request.latest_user_query().as_deref(), Some("hi"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name echoed back in responses
    #[serde(default = "default_model")]
    pub model: String,
    /// Conversation so far
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the answer as SSE
    #[serde(default)]
    pub stream: bool,
    /// Accepted for compatibility; the agent ignores it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Accepted for compatibility; the agent ignores it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Caller identity, used as the conversation key when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatCompletionRequest {
    /// Text of the most recent user message that has content
    ///
    /// Array content contributes the concatenation of its `text` parts.
    /// Returns `None` when no such message exists or its text is empty.
    pub fn latest_user_query(&self) -> Option<String> {
        let message = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user" && !m.content.is_empty())?;

        let query = message.content.text();
        if query.is_empty() {
            None
        } else {
            Some(query)
        }
    }

    /// Number of `user` messages in the conversation
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == "user").count()
    }

    /// Whether the request continues an earlier exchange
    ///
    /// More than one user message means the client is replaying history, so
    /// the stored agent session should be resumed.
    pub fn is_continuation(&self) -> bool {
        self.user_message_count() > 1
    }
}

/// One message in the request conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message content
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content: a plain string or an array of typed parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Multimodal parts; only `text` parts are read
    Parts(Vec<ContentPart>),
    /// Explicit `null` or absent
    #[default]
    Null,
}

impl MessageContent {
    /// True for `null`, `""` and `[]`
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
            Self::Null => true,
        }
    }

    /// Text carried by this content, with array text parts concatenated
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.as_deref())
                .collect(),
            Self::Null => String::new(),
        }
    }
}

/// One part of multimodal message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part type (`text`, `image_url`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Text of a `text` part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Assistant message in a non-streaming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}

/// Choice in a non-streaming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

/// Token usage in a non-streaming response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<crate::agent::Usage> for Usage {
    fn from(usage: crate::agent::Usage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.total(),
        }
    }
}

/// OpenAI-compatible non-streaming chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub system_fingerprint: String,
}

impl ChatCompletionResponse {
    /// Build a single-choice response carrying `content`
    pub fn new(
        id: impl Into<String>,
        created: i64,
        model: &str,
        content: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: content.into(),
                },
                finish_reason: "stop".to_string(),
            }],
            usage,
            system_fingerprint: system_fingerprint(model),
        }
    }
}

/// Delta carried by a streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Choice in a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Always serialized as `null`
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
}

/// OpenAI-compatible `chat.completion.chunk`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub system_fingerprint: String,
    pub choices: Vec<ChunkChoice>,
}

/// Error body inside an error envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: Option<String>,
}

/// Error frame sent in place of the terminal chunk of a failed stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub error: ErrorDetail,
}

/// Error body returned with non-2xx HTTP responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

impl ErrorResponse {
    /// `invalid_request_error` envelope
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_type(message, "invalid_request_error")
    }

    /// `internal_error` envelope
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_type(message, "internal_error")
    }

    fn with_type(message: impl Into<String>, error_type: &str) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.to_string(),
                code: None,
            },
        }
    }
}

/// `system_fingerprint` reported for `model`
pub fn system_fingerprint(model: &str) -> String {
    format!("fp_{}", model)
}
