//! End-to-end gateway tests driving a real agent subprocess
//!
//! The agent CLI is replaced by a shell script that prints canned
//! stream-json frames, so these tests cover process spawning, line decoding,
//! translation and session persistence together.

#![cfg(unix)]

mod common;

use agentgate::agent::SubprocessFactory;
use agentgate::config::Config;
use agentgate::server::{router, AppState};
use agentgate::session::SessionStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use common::{fake_agent_cli, text_turn};
use tempfile::TempDir;
use tower::ServiceExt;

struct Gateway {
    state: AppState,
    dir: TempDir,
}

fn gateway(agent_body: &str) -> Gateway {
    let dir = TempDir::new().unwrap();
    let cli = fake_agent_cli(&dir, agent_body);

    let mut config = Config::default();
    config.agent.cli_path = cli.to_string_lossy().to_string();
    config.agent.working_directory = Some(dir.path().to_string_lossy().to_string());

    let store = SessionStore::new(dir.path().join("sessions"));
    let factory = SubprocessFactory::new(cli);
    Gateway {
        state: AppState::new(config, store, factory),
        dir,
    }
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

#[tokio::test]
async fn test_non_streaming_turn_through_subprocess() {
    let gw = gateway(&text_turn("Hi from the agent", "sess-e2e"));

    let response = post(
        &gw.state,
        serde_json::json!({
            "model": "claude-sonnet-4",
            "messages": [{"role": "user", "content": "hello"}]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "Hi from the agent");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 7);

    assert_eq!(
        gw.state.store.load("current").await,
        Some(("sess-e2e".to_string(), None))
    );
}

#[tokio::test]
async fn test_streaming_turn_through_subprocess() {
    let gw = gateway(&text_turn("streamed", "sess-stream"));

    let response = post(
        &gw.state,
        serde_json::json!({
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true,
            "user": "alice"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = body_string(response).await;
    assert!(body.contains("\"content\":\"streamed\\n\""));
    assert!(body.contains("\"finish_reason\":\"stop\""));
    assert!(body.trim_end().ends_with("data: [DONE]"));

    assert_eq!(
        gw.state.store.load("alice").await,
        Some(("sess-stream".to_string(), None))
    );
}

#[tokio::test]
async fn test_agent_exit_failure_saves_nothing() {
    let gw = gateway("echo 'boom' >&2\nexit 3");

    let response = post(
        &gw.state,
        serde_json::json!({
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true
        }),
    )
    .await;
    let body = body_string(response).await;

    assert!(body.contains("\"error\""));
    assert!(!body.contains("\"finish_reason\":\"stop\""));
    assert!(body.trim_end().ends_with("data: [DONE]"));
    assert!(gw.state.store.load("current").await.is_none());
    assert!(gw.dir.path().exists());
}

#[tokio::test]
async fn test_missing_agent_binary_is_500_for_non_streaming() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.agent.working_directory = Some(dir.path().to_string_lossy().to_string());
    let state = AppState::new(
        config,
        SessionStore::new(dir.path().join("sessions")),
        SubprocessFactory::new(dir.path().join("no-such-agent")),
    );

    let response = post(
        &state,
        serde_json::json!({"messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"]["message"].is_string());
}
