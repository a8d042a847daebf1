//! Agent message stream to OpenAI chunk stream translation
//!
//! [`translate`] turns the messages of one agent turn into the frame
//! sequence an OpenAI streaming client expects:
//!
//! 1. a role-announcing [`StreamFrame::Delta`] with empty content,
//! 2. one `Delta` per assistant text block (text plus a trailing newline),
//! 3. a single [`StreamFrame::Stop`] carrying the session id, or a single
//!    [`StreamFrame::Error`] if the agent stream failed,
//! 4. [`StreamFrame::Done`].
//!
//! Every frame is paired with an optional session id. Only the `Stop` frame
//! carries one, so callers persist the session exactly when the turn
//! completed.

use std::pin::Pin;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::agent::{AgentMessage, ContentBlock};
use crate::error::Result;
use crate::openai::types::{
    system_fingerprint, ChatCompletionChunk, ChunkChoice, ChunkDelta, ErrorDetail, StreamError,
};

/// Literal payload of the end-of-stream sentinel
pub const SSE_DONE: &str = "[DONE]";

/// Prefix of every completion id
pub const COMPLETION_ID_PREFIX: &str = "chatcmpl-";

/// One frame of a translated response stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Content-delta chunk (including the initial role chunk)
    Delta(ChatCompletionChunk),
    /// Terminal chunk with `finish_reason = "stop"`
    Stop(ChatCompletionChunk),
    /// Error envelope sent instead of `Stop`
    Error(StreamError),
    /// End-of-stream sentinel
    Done,
}

impl StreamFrame {
    /// Frame body without SSE framing: chunk JSON, or `[DONE]`
    pub fn payload(&self) -> String {
        match self {
            Self::Delta(chunk) | Self::Stop(chunk) => to_json(chunk),
            Self::Error(error) => to_json(error),
            Self::Done => SSE_DONE.to_string(),
        }
    }

    /// Frame rendered as an SSE event: `data: <payload>\n\n`
    ///
    /// # Examples
    ///
    /// ```
    /// use agentgate::openai::StreamFrame;
    ///
    /// assert_eq!(StreamFrame::Done.to_sse(), "data: [DONE]\n\n");
    /// ```
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.payload())
    }

    /// Text content carried by a `Delta` frame
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Delta(chunk) => chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_deref()),
            _ => None,
        }
    }

    /// True for `Stop` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop(_) | Self::Error(_))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize stream frame");
        r#"{"error":{"message":"failed to serialize stream frame","type":"internal_error","code":null}}"#
            .to_string()
    })
}

/// Stream of translated frames, each paired with an optional session id
pub type FrameStream<'a> = Pin<Box<dyn Stream<Item = (StreamFrame, Option<String>)> + Send + 'a>>;

/// Generate a fresh completion id: `chatcmpl-` plus 8 lowercase hex digits
///
/// # Examples
///
/// ```
/// use agentgate::openai::generate_completion_id;
///
/// let id = generate_completion_id();
/// assert!(id.starts_with("chatcmpl-"));
/// assert_eq!(id.len(), "chatcmpl-".len() + 8);
/// ```
pub fn generate_completion_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", COMPLETION_ID_PREFIX, &hex[..8])
}

/// Shared header fields of every chunk in one stream
#[derive(Debug, Clone)]
struct ChunkTemplate {
    id: String,
    created: i64,
    model: String,
}

impl ChunkTemplate {
    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: system_fingerprint(&self.model),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    fn role(&self) -> StreamFrame {
        StreamFrame::Delta(self.chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
            },
            None,
        ))
    }

    fn text(&self, text: &str) -> StreamFrame {
        StreamFrame::Delta(self.chunk(
            ChunkDelta {
                role: None,
                content: Some(format!("{}\n", text)),
            },
            None,
        ))
    }

    fn stop(&self) -> StreamFrame {
        StreamFrame::Stop(self.chunk(ChunkDelta::default(), Some("stop")))
    }

    fn error(&self, message: String) -> StreamFrame {
        StreamFrame::Error(StreamError {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            error: ErrorDetail {
                message,
                error_type: "internal_error".to_string(),
                code: None,
            },
        })
    }
}

/// Translate one agent turn into OpenAI stream frames
///
/// The agent stream is consumed up to and including its result message, or
/// up to its first error, then dropped without being drained. The returned
/// stream always ends with [`StreamFrame::Done`].
///
/// # Arguments
///
/// * `messages` - Agent messages for one turn
/// * `model` - Model name reported in every chunk
/// * `completion_id` - Id shared by every chunk; generated when `None`
///
/// # Examples
///
/// ```
/// use agentgate::agent::AgentMessage;
/// use agentgate::openai::{translate, StreamFrame};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let messages = futures::stream::iter(vec![
///     Ok(AgentMessage::text("Hello")),
///     Ok(AgentMessage::result("sess-1")),
/// ]);
/// let frames: Vec<_> = translate(messages, "claude-sonnet-4", None).collect().await;
///
/// assert_eq!(frames.len(), 4);
/// assert_eq!(frames[1].0.content(), Some("Hello\n"));
/// assert_eq!(frames[2].1.as_deref(), Some("sess-1"));
/// assert_eq!(frames[3].0, StreamFrame::Done);
/// # }
/// ```
pub fn translate<'a, S>(
    messages: S,
    model: impl Into<String>,
    completion_id: Option<String>,
) -> FrameStream<'a>
where
    S: Stream<Item = Result<AgentMessage>> + Send + 'a,
{
    let template = ChunkTemplate {
        id: completion_id.unwrap_or_else(generate_completion_id),
        created: chrono::Utc::now().timestamp(),
        model: model.into(),
    };

    Box::pin(stream! {
        yield (template.role(), None);

        let mut messages = Box::pin(messages);
        while let Some(item) = messages.next().await {
            match item {
                Ok(AgentMessage::Assistant(assistant)) => {
                    for block in &assistant.content {
                        match block {
                            ContentBlock::Text { text } => {
                                yield (template.text(text), None);
                            }
                            ContentBlock::ToolUse { name, .. } => {
                                tracing::debug!(tool = %name, "agent tool use");
                            }
                            ContentBlock::ToolResult { tool_use_id, .. } => {
                                tracing::debug!(tool_use_id = %tool_use_id, "agent tool result");
                            }
                            ContentBlock::Unsupported => {}
                        }
                    }
                }
                Ok(AgentMessage::Result(result)) => {
                    if result.is_error {
                        tracing::warn!(session_id = %result.session_id, "agent turn ended in error state");
                    }
                    tracing::debug!(session_id = %result.session_id, "captured session id");
                    yield (template.stop(), Some(result.session_id));
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "agent stream failed");
                    yield (template.error(format!("{:#}", e)), None);
                    break;
                }
            }
        }
        drop(messages);

        yield (StreamFrame::Done, None);
    })
}

/// Concatenate the text blocks of every assistant message, in order
///
/// # Examples
///
/// ```
/// use agentgate::agent::AgentMessage;
/// use agentgate::openai::extract_text;
///
/// let messages = vec![
///     AgentMessage::text("Hello, "),
///     AgentMessage::text("world"),
///     AgentMessage::result("sess-1"),
/// ];
/// assert_eq!(extract_text(&messages), "Hello, world");
/// ```
pub fn extract_text(messages: &[AgentMessage]) -> String {
    messages
        .iter()
        .filter_map(|message| match message {
            AgentMessage::Assistant(assistant) => Some(&assistant.content),
            AgentMessage::Result(_) => None,
        })
        .flatten()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
