//! OpenAI-compatible HTTP gateway
//!
//! Routes:
//!
//! - `POST /v1/chat/completions` - chat with the agent, streaming or not
//! - `GET /health` - liveness probe
//! - `GET /` - service description
//!
//! CORS is permissive so browser-hosted clients can call the gateway
//! directly.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::AgentClientFactory;
use crate::config::Config;
use crate::error::{AgentGateError, Result};
use crate::session::SessionStore;

pub mod handlers;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Session persistence
    pub store: Arc<SessionStore>,
    /// Builds one agent client per request
    pub factory: Arc<dyn AgentClientFactory>,
}

impl AppState {
    /// Bundle the gateway's collaborators
    pub fn new(
        config: Config,
        store: SessionStore,
        factory: impl AgentClientFactory + 'static,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            factory: Arc::new(factory),
        }
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the gateway until Ctrl-C
///
/// # Errors
///
/// Returns error if the configured address is invalid or cannot be bound.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .map_err(|e| AgentGateError::Config(format!("Invalid listen address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        sessions = %state.store.dir().display(),
        "AgentGate listening; chat endpoint at http://{}/v1/chat/completions",
        addr
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("AgentGate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
