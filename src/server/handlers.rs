//! Gateway request handlers

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::json;

use crate::agent::{AgentMessage, AgentOptions};
use crate::error::Result;
use crate::openai::{
    extract_text, generate_completion_id, translate, ChatCompletionRequest,
    ChatCompletionResponse, ErrorResponse, FrameStream, Usage,
};
use crate::server::AppState;
use crate::session::ConversationKey;

/// Handler error rendered as an OpenAI error envelope
#[derive(Debug)]
pub enum ApiError {
    /// 400 with `invalid_request_error`
    BadRequest(String),
    /// 500 with `internal_error`
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::invalid_request(msg))
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal(msg))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "agentgate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "AgentGate",
        "description": "OpenAI-compatible chat completions backed by a coding agent",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/v1/chat/completions",
            "health": "/health",
        },
    }))
}

/// Everything needed to run one agent turn for a request
struct Turn {
    key: ConversationKey,
    query: String,
    model: String,
    options: AgentOptions,
}

async fn prepare_turn(
    state: &AppState,
    request: &ChatCompletionRequest,
) -> std::result::Result<Turn, ApiError> {
    let query = request
        .latest_user_query()
        .ok_or_else(|| ApiError::BadRequest("No user message found".to_string()))?;

    let key = ConversationKey::from(
        request
            .user
            .clone()
            .unwrap_or_else(|| ConversationKey::HTTP_DEFAULT.to_string()),
    );

    let resume = if request.is_continuation() {
        match state.store.load(key.clone()).await {
            Some((session_id, _)) => {
                tracing::info!(key = %key, session_id = %session_id, "Resuming session");
                Some(session_id)
            }
            None => {
                tracing::warn!(key = %key, "No session found, starting new conversation");
                None
            }
        }
    } else {
        tracing::info!(key = %key, "New conversation");
        None
    };

    let default_dir = state.config.agent.default_working_directory();
    let cwd = state.store.get_directory(key.clone(), &default_dir).await;
    let options = state.config.agent.options(cwd, resume);

    Ok(Turn {
        key,
        query,
        model: request.model.clone(),
        options,
    })
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> std::result::Result<Response, ApiError> {
    let turn = prepare_turn(&state, &request).await?;

    if request.stream {
        Ok(stream_completion(state, turn))
    } else {
        complete(state, turn).await.map(IntoResponse::into_response)
    }
}

fn stream_completion(state: AppState, turn: Turn) -> Response {
    let Turn {
        key,
        query,
        model,
        options,
    } = turn;
    let completion_id = generate_completion_id();

    let events = stream! {
        let mut client = state.factory.create(options);
        let started = match client.connect().await {
            Ok(()) => client.query(&query).await,
            Err(e) => Err(e),
        };

        let mut frames: FrameStream<'_> = match started {
            Ok(()) => translate(client.receive_messages(), model, Some(completion_id)),
            Err(e) => {
                let failed: Vec<Result<AgentMessage>> = vec![Err(e)];
                translate(futures::stream::iter(failed), model, Some(completion_id))
            }
        };

        while let Some((frame, session_id)) = frames.next().await {
            if let Some(session_id) = session_id {
                match state.store.save(key.clone(), &session_id, None).await {
                    Ok(()) => tracing::info!(key = %key, session_id = %session_id, "Saved session"),
                    Err(e) => tracing::error!(key = %key, error = %e, "Failed to save session"),
                }
            }
            yield Ok::<Event, Infallible>(Event::default().data(frame.payload()));
        }
        drop(frames);

        if let Err(e) = client.disconnect().await {
            tracing::warn!(error = %e, "Agent did not shut down cleanly");
        }
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

async fn complete(
    state: AppState,
    turn: Turn,
) -> std::result::Result<Json<ChatCompletionResponse>, ApiError> {
    let completion_id = generate_completion_id();
    let created = chrono::Utc::now().timestamp();

    let mut client = state.factory.create(turn.options);
    let outcome = async {
        client.connect().await?;
        client.query(&turn.query).await?;

        let mut messages = Vec::new();
        let mut responses = client.receive_response();
        while let Some(message) = responses.next().await {
            messages.push(message?);
        }
        Ok::<_, anyhow::Error>(messages)
    }
    .await;

    if let Err(e) = client.disconnect().await {
        tracing::warn!(error = %e, "Agent did not shut down cleanly");
    }

    let messages = outcome.map_err(|e| {
        tracing::error!(error = %e, "Agent turn failed");
        ApiError::Internal(format!("{:#}", e))
    })?;

    let result = messages.iter().rev().find_map(|message| match message {
        AgentMessage::Result(result) => Some(result),
        AgentMessage::Assistant(_) => None,
    });

    if let Some(result) = result {
        match state
            .store
            .save(turn.key.clone(), &result.session_id, None)
            .await
        {
            Ok(()) => {
                tracing::info!(key = %turn.key, session_id = %result.session_id, "Saved session")
            }
            Err(e) => tracing::error!(key = %turn.key, error = %e, "Failed to save session"),
        }
    }

    let usage = result
        .and_then(|result| result.usage)
        .map(Usage::from)
        .unwrap_or_default();

    Ok(Json(ChatCompletionResponse::new(
        completion_id,
        created,
        &turn.model,
        extract_text(&messages),
        usage,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fake::ScriptedFactory;
    use crate::agent::{ResultMessage, Usage as AgentUsage};
    use crate::config::Config;
    use crate::server::router;
    use crate::session::SessionStore;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        factory: ScriptedFactory,
        _dir: TempDir,
    }

    fn harness(factory: ScriptedFactory) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.agent.working_directory = Some("/default/dir".to_string());
        let state = AppState::new(config, SessionStore::new(dir.path()), factory.clone());
        Harness {
            state,
            factory,
            _dir: dir,
        }
    }

    fn success_script() -> Vec<std::result::Result<AgentMessage, String>> {
        vec![
            Ok(AgentMessage::text("Hello")),
            Ok(AgentMessage::text("world")),
            Ok(AgentMessage::Result(ResultMessage {
                session_id: "sess-new".to_string(),
                is_error: false,
                num_turns: Some(1),
                duration_ms: Some(10),
                total_cost_usd: None,
                usage: Some(AgentUsage {
                    input_tokens: 3,
                    output_tokens: 4,
                }),
                result: None,
            })),
        ]
    }

    async fn post(state: &AppState, body: serde_json::Value) -> Response {
        router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn data_lines(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(ScriptedFactory::default());
        let response = router(h.state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "agentgate");
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let h = harness(ScriptedFactory::default());
        let response = router(h.state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["endpoints"]["chat"], "/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_user_message_is_400_without_side_effects() {
        let h = harness(ScriptedFactory::new(success_script()));
        let response = post(
            &h.state,
            json!({"messages": [{"role": "system", "content": "only system"}]}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["message"], "No user message found");
        assert_eq!(json["error"]["type"], "invalid_request_error");

        assert!(h.factory.options().is_empty());
        assert!(h.state.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_streaming_completion() {
        let h = harness(ScriptedFactory::new(success_script()));
        let response = post(
            &h.state,
            json!({"model": "claude-sonnet-4", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["content"], "Helloworld");
        assert_eq!(json["usage"]["prompt_tokens"], 3);
        assert_eq!(json["usage"]["total_tokens"], 7);
        assert!(json["id"].as_str().unwrap().starts_with("chatcmpl-"));

        assert_eq!(h.factory.prompts(), vec!["hi".to_string()]);
        assert_eq!(
            h.state.store.load("current").await,
            Some(("sess-new".to_string(), None))
        );
    }

    #[tokio::test]
    async fn test_non_streaming_uses_request_user_as_key() {
        let h = harness(ScriptedFactory::new(success_script()));
        post(
            &h.state,
            json!({"user": "alice", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        assert!(h.state.store.load("alice").await.is_some());
        assert!(h.state.store.load("current").await.is_none());
    }

    #[tokio::test]
    async fn test_non_streaming_agent_failure_is_500() {
        let h = harness(ScriptedFactory::failing_connect("spawn failed"));
        let response = post(&h.state, json!({"messages": [{"role": "user", "content": "hi"}]})).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["type"], "internal_error");
        assert!(json["error"]["message"].as_str().unwrap().contains("spawn failed"));
        assert!(h.state.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_completion_saves_session() {
        let h = harness(ScriptedFactory::new(success_script()));
        let response = post(
            &h.state,
            json!({"stream": true, "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");

        let body = body_string(response).await;
        let data = data_lines(&body);
        assert_eq!(data.len(), 5);
        assert_eq!(data.last().unwrap(), "[DONE]");

        let chunks: Vec<serde_json::Value> = data[..4]
            .iter()
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "Hello\n");
        assert_eq!(chunks[2]["choices"][0]["delta"]["content"], "world\n");
        assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
        assert!(chunks.iter().all(|c| c["id"] == chunks[0]["id"]));

        assert_eq!(
            h.state.store.load("current").await,
            Some(("sess-new".to_string(), None))
        );
    }

    #[tokio::test]
    async fn test_streaming_failure_emits_error_frame_and_saves_nothing() {
        let h = harness(ScriptedFactory::new(vec![
            Ok(AgentMessage::text("partial")),
            Err("agent crashed".to_string()),
        ]));
        let response = post(
            &h.state,
            json!({"stream": true, "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        let data = data_lines(&body_string(response).await);
        assert_eq!(data.len(), 4);
        let error: serde_json::Value = serde_json::from_str(&data[2]).unwrap();
        assert_eq!(error["error"]["type"], "internal_error");
        assert!(error["error"]["message"].as_str().unwrap().contains("agent crashed"));
        assert_eq!(data[3], "[DONE]");

        assert!(h.state.store.load("current").await.is_none());
    }

    #[tokio::test]
    async fn test_client_disconnect_abandons_agent_without_saving() {
        let factory = ScriptedFactory::stalling(vec![Ok(AgentMessage::text("Hello"))]);
        let h = harness(factory);
        let response = post(
            &h.state,
            json!({"stream": true, "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let mut received = String::new();
        while !received.contains("Hello") {
            let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), body.next())
                .await
                .expect("timed out waiting for the first text frame")
                .expect("stream ended early")
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert_eq!(h.factory.live_clients(), 1);

        // The HTTP client goes away mid-turn
        drop(body);

        assert_eq!(h.factory.live_clients(), 0);
        assert!(h.state.store.load("current").await.is_none());
        assert!(h.state.store.record("current").await.is_none());
    }

    #[tokio::test]
    async fn test_streaming_connect_failure_is_error_stream() {
        let h = harness(ScriptedFactory::failing_connect("no agent binary"));
        let response = post(
            &h.state,
            json!({"stream": true, "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let data = data_lines(&body_string(response).await);
        assert_eq!(data.len(), 3);
        let error: serde_json::Value = serde_json::from_str(&data[1]).unwrap();
        assert!(error["error"]["message"].as_str().unwrap().contains("no agent binary"));
        assert_eq!(data[2], "[DONE]");
    }

    #[tokio::test]
    async fn test_continuation_resumes_stored_session() {
        let h = harness(ScriptedFactory::new(success_script()));
        h.state.store.save("current", "sess-old", None).await.unwrap();

        post(
            &h.state,
            json!({"messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "answer"},
                {"role": "user", "content": "second"},
            ]}),
        )
        .await;

        let options = h.factory.options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].resume.as_deref(), Some("sess-old"));
        assert_eq!(h.factory.prompts(), vec!["second".to_string()]);
        assert_eq!(
            h.state.store.load("current").await.map(|(sid, _)| sid),
            Some("sess-new".to_string())
        );
    }

    #[tokio::test]
    async fn test_single_user_message_starts_fresh() {
        let h = harness(ScriptedFactory::new(success_script()));
        h.state.store.save("current", "sess-old", None).await.unwrap();

        post(&h.state, json!({"messages": [{"role": "user", "content": "hi"}]})).await;

        assert_eq!(h.factory.options()[0].resume, None);
    }

    #[tokio::test]
    async fn test_working_directory_comes_from_store_or_config() {
        let h = harness(ScriptedFactory::new(success_script()));
        post(&h.state, json!({"messages": [{"role": "user", "content": "hi"}]})).await;

        h.state.store.set_directory("current", "/projects/notes").await.unwrap();
        post(&h.state, json!({"messages": [{"role": "user", "content": "hi"}]})).await;

        let options = h.factory.options();
        assert_eq!(options[0].cwd.as_deref(), Some("/default/dir"));
        assert_eq!(options[1].cwd.as_deref(), Some("/projects/notes"));
        assert_eq!(options[1].allowed_tools, h.state.config.agent.allowed_tools);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let h = harness(ScriptedFactory::default());
        let response = router(h.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "app://obsidian.md")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
