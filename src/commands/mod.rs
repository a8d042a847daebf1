/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `serve`       - Run the OpenAI-compatible HTTP gateway
- `chat`        - Interactive terminal chat with session resumption
- `sessions`    - Inspect and edit saved session records
- `search`      - Find candidate working directories

Handlers stay thin over the library components: the session store,
the agent client and the HTTP server.
*/

use crate::agent::{AgentClient, AgentClientFactory, AgentMessage, ContentBlock, SubprocessFactory};
use crate::config::Config;
use crate::error::{AgentGateError, Result};
use crate::session::{ConversationKey, SessionStore};

// Session record management
pub mod sessions;

// Working-directory search
pub mod search;

// HTTP gateway command handler
pub mod serve {
    //! Gateway startup.
    //!
    //! Resolves the sessions directory, wires the subprocess agent factory
    //! into the server state, and serves until Ctrl-C.

    use super::*;
    use crate::server::{self, AppState};

    /// Run the HTTP gateway
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    ///
    /// # Errors
    ///
    /// Returns error if the sessions directory cannot be resolved or the
    /// listen address cannot be bound.
    pub async fn run_serve(config: Config) -> Result<()> {
        let store = SessionStore::new(config.sessions.resolve_dir()?);
        let factory = SubprocessFactory::new(config.agent.cli_path.clone());

        tracing::info!(
            cli = %config.agent.cli_path,
            default_cwd = %config.agent.default_working_directory(),
            "Starting gateway"
        );

        server::serve(AppState::new(config, store, factory)).await
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Keeps one agent process for the whole session and submits each input
    //! line as a new turn. Assistant text is printed green and tool calls as
    //! magenta badges. The session id from every completed turn is saved so
    //! `chat --continue` can pick the conversation up later.

    use super::*;
    use colored::Colorize;
    use futures::StreamExt;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `resume` - Resume the session saved under `key`
    /// * `key` - Conversation key the session is stored under
    ///
    /// # Examples
    ///
    /// ```
    /// use agentgate::commands::chat;
    /// use agentgate::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default(), true, "current_session".into()).await?;
    /// ```
    pub async fn run_chat(config: Config, resume: bool, key: String) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let store = SessionStore::new(config.sessions.resolve_dir()?);
        let key = ConversationKey::from(key);

        let resume_id = if resume {
            match store.load(key.clone()).await {
                Some((session_id, _)) => {
                    println!("{} {}", "Resuming session".cyan(), session_id);
                    Some(session_id)
                }
                None => {
                    println!(
                        "{}",
                        "No saved session found, starting a new conversation".yellow()
                    );
                    None
                }
            }
        } else {
            None
        };

        let cwd = store
            .get_directory(key.clone(), &config.agent.default_working_directory())
            .await;
        let factory = SubprocessFactory::new(config.agent.cli_path.clone());
        let mut client = factory.create(config.agent.options(cwd.clone(), resume_id));
        client.connect().await?;

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&cwd);

        loop {
            match rl.readline(&format!("{} ", "You:".blue().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if matches!(trimmed.to_lowercase().as_str(), "exit" | "quit") {
                        break;
                    }
                    add_to_history(&mut rl, trimmed)?;

                    if let Err(e) = run_turn(client.as_mut(), &store, &key, trimmed).await {
                        eprintln!("{} {:#}\n", "Error:".red().bold(), e);
                        if !is_agent_failure(&e) {
                            continue;
                        }

                        if let Err(e) = client.disconnect().await {
                            tracing::debug!("Failed agent did not shut down cleanly: {}", e);
                        }
                        let resume_id = store.load(key.clone()).await.map(|(id, _)| id);
                        client = factory.create(config.agent.options(cwd.clone(), resume_id));
                        if let Err(e) = client.connect().await {
                            eprintln!("{} {:#}", "Could not restart the agent:".red().bold(), e);
                            break;
                        }
                        println!("{}\n", "Agent restarted; the conversation continues.".yellow());
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        if let Err(e) = client.disconnect().await {
            tracing::warn!("Agent did not shut down cleanly: {}", e);
        }
        println!("Goodbye!");
        Ok(())
    }

    /// Run one prompt through `client`, printing the reply as it arrives
    ///
    /// Saves the session id under `key` when the turn completes.
    ///
    /// # Errors
    ///
    /// Returns error if the prompt cannot be sent, the agent stream fails,
    /// or the session cannot be saved.
    pub async fn run_turn(
        client: &mut dyn AgentClient,
        store: &SessionStore,
        key: &ConversationKey,
        prompt: &str,
    ) -> Result<Vec<String>> {
        client.query(prompt).await?;

        let mut printed = Vec::new();
        let mut responses = client.receive_response();
        while let Some(message) = responses.next().await {
            let message = message?;
            for line in render_message(&message) {
                println!("{}", line);
                printed.push(line);
            }
            if let AgentMessage::Result(result) = &message {
                store.save(key.clone(), &result.session_id, None).await?;
            }
        }
        println!();
        Ok(printed)
    }

    /// Record `line` in the editor's history
    ///
    /// # Errors
    ///
    /// Returns error if the history cannot be updated.
    pub fn add_to_history(rl: &mut DefaultEditor, line: &str) -> Result<()> {
        rl.add_history_entry(line)?;
        Ok(())
    }

    /// Whether `error` left the agent process unusable for further turns
    pub fn is_agent_failure(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<AgentGateError>(),
            Some(AgentGateError::Agent(_) | AgentGateError::Protocol(_))
        )
    }

    /// Terminal lines for one agent message
    pub fn render_message(message: &AgentMessage) -> Vec<String> {
        match message {
            AgentMessage::Assistant(assistant) => assistant
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.green().to_string()),
                    ContentBlock::ToolUse { name, .. } => {
                        Some(format!("🔧 {}", name).magenta().bold().to_string())
                    }
                    ContentBlock::ToolResult { .. } | ContentBlock::Unsupported => None,
                })
                .collect(),
            AgentMessage::Result(result) => {
                let mut summary = format!("session {}", result.session_id);
                if let Some(cost) = result.total_cost_usd {
                    summary.push_str(&format!(", ${:.4}", cost));
                }
                vec![format!("({})", summary).dimmed().to_string()]
            }
        }
    }

    fn print_welcome_banner(cwd: &str) {
        println!();
        println!("{}", "AgentGate chat".bold());
        println!("Working directory: {}", cwd.cyan());
        println!("Type {} or {} to leave.", "exit".yellow(), "quit".yellow());
        println!();
    }

}
