//! OpenAI-compatible surface
//!
//! Wire types for chat completion requests, responses and streaming chunks,
//! plus the translator from agent message streams to chunk streams.

pub mod translate;
pub mod types;

pub use translate::{
    extract_text, generate_completion_id, translate, FrameStream, StreamFrame, SSE_DONE,
};
pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ErrorResponse, MessageContent, StreamError, Usage, DEFAULT_MODEL,
};
