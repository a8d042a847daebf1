//! Agent client backed by the agent CLI running as a child process
//!
//! The CLI is launched in `stream-json` mode on both stdin and stdout:
//!
//! - Prompts are written to the child's stdin as one JSON user message per
//!   line.
//! - Stdout carries one JSON frame per line, decoded with
//!   [`AgentMessage::from_line`].
//! - Stderr is diagnostic only and is logged at `DEBUG`.
//!
//! The child is spawned with `kill_on_drop`, so abandoning a client mid-turn
//! (for example when an HTTP client disconnects) terminates the agent
//! without producing a result.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_stream::wrappers::LinesStream;

use crate::agent::client::{AgentClient, AgentClientFactory, AgentOptions, MessageStream};
use crate::agent::types::AgentMessage;
use crate::error::{AgentGateError, Result};

/// How long `disconnect` waits for the child to exit after stdin closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Agent client driving a child process
///
/// # Examples
///
/// ```no_run
/// use agentgate::agent::{AgentClient, AgentOptions, SubprocessClient};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let mut client = SubprocessClient::new("claude", AgentOptions::default().with_cwd("/tmp"));
/// client.connect().await?;
/// client.query("List the files here").await?;
/// let mut messages = client.receive_response();
/// while let Some(message) = messages.next().await {
///     println!("{:?}", message?);
/// }
/// drop(messages);
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SubprocessClient {
    cli_path: PathBuf,
    options: AgentOptions,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<LinesStream<BufReader<ChildStdout>>>,
}

impl SubprocessClient {
    /// Create an unconnected client for the CLI at `cli_path`
    pub fn new(cli_path: impl Into<PathBuf>, options: AgentOptions) -> Self {
        Self {
            cli_path: cli_path.into(),
            options,
            child: None,
            stdin: None,
            stdout: None,
        }
    }

    /// Options this client was created with
    pub fn options(&self) -> &AgentOptions {
        &self.options
    }
}

/// Build the command-line arguments for `options`
///
/// # Errors
///
/// Returns [`AgentGateError::Serialization`] if the tool server map cannot be
/// rendered as JSON.
pub fn build_args(options: &AgentOptions) -> Result<Vec<String>> {
    let mut args: Vec<String> = [
        "--print",
        "--output-format",
        "stream-json",
        "--input-format",
        "stream-json",
        "--verbose",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(prompt) = &options.system_prompt {
        args.push("--system-prompt".to_string());
        args.push(prompt.clone());
    }
    if !options.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(options.allowed_tools.join(","));
    }
    if let Some(model) = &options.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(session_id) = &options.resume {
        args.push("--resume".to_string());
        args.push(session_id.clone());
    }
    if !options.tool_servers.is_empty() {
        let mcp_config = serde_json::json!({ "mcpServers": &options.tool_servers });
        args.push("--mcp-config".to_string());
        args.push(serde_json::to_string(&mcp_config).map_err(AgentGateError::from)?);
    }

    Ok(args)
}

fn not_connected() -> anyhow::Error {
    AgentGateError::Agent("client not connected; call connect() first".to_string()).into()
}

#[async_trait]
impl AgentClient for SubprocessClient {
    async fn connect(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let args = build_args(&self.options)?;
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            AgentGateError::Agent(format!(
                "failed to spawn agent CLI `{}`: {}",
                self.cli_path.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentGateError::Agent("child stdin unavailable after spawn".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentGateError::Agent("child stdout unavailable after spawn".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentGateError::Agent("child stderr unavailable after spawn".into()))?;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "agentgate::agent::subprocess", "agent stderr: {}", line);
            }
        });

        tracing::debug!(
            cli = %self.cli_path.display(),
            cwd = ?self.options.cwd,
            resume = ?self.options.resume,
            "agent process started"
        );

        self.stdin = Some(stdin);
        self.stdout = Some(LinesStream::new(BufReader::new(stdout).lines()));
        self.child = Some(child);
        Ok(())
    }

    async fn query(&mut self, prompt: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(not_connected)?;

        let message = serde_json::json!({
            "type": "user",
            "message": { "role": "user", "content": prompt },
        });
        let mut line = serde_json::to_string(&message).map_err(AgentGateError::from)?;
        line.push('\n');

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentGateError::Agent(format!("failed to send prompt: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| AgentGateError::Agent(format!("failed to send prompt: {}", e)))?;
        Ok(())
    }

    fn receive_messages(&mut self) -> MessageStream<'_> {
        let stdout = self.stdout.as_mut();
        let child = self.child.as_mut();

        Box::pin(async_stream::stream! {
            let (Some(lines), Some(child)) = (stdout, child) else {
                yield Err(not_connected());
                return;
            };

            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(anyhow::Error::from(AgentGateError::Agent(
                            format!("failed to read agent output: {}", e),
                        )));
                        return;
                    }
                };
                match AgentMessage::from_line(&line) {
                    Ok(Some(message)) => yield Ok(message),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    yield Err(anyhow::Error::from(AgentGateError::Agent(
                        format!("agent process exited with {}", status),
                    )));
                }
                Err(e) => {
                    yield Err(anyhow::Error::from(AgentGateError::Agent(
                        format!("failed to wait for agent process: {}", e),
                    )));
                }
            }
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        // Closing stdin tells the CLI no further prompts are coming.
        drop(self.stdin.take());
        self.stdout = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "agent process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(AgentGateError::Agent(format!(
                "failed to wait for agent process: {}",
                e
            ))
            .into()),
            Err(_) => {
                tracing::warn!("agent process did not exit after stdin closed; killing it");
                child.kill().await.map_err(AgentGateError::from)?;
                Ok(())
            }
        }
    }
}

/// Factory launching one [`SubprocessClient`] per turn
#[derive(Debug, Clone)]
pub struct SubprocessFactory {
    cli_path: PathBuf,
}

impl SubprocessFactory {
    /// Create a factory for the CLI at `cli_path`
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }
}

impl AgentClientFactory for SubprocessFactory {
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient> {
        Box::new(SubprocessClient::new(self.cli_path.clone(), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::ToolServerConfig;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_build_args_minimal() {
        let args = build_args(&AgentOptions::default()).unwrap();
        assert_eq!(
            args,
            vec![
                "--print",
                "--output-format",
                "stream-json",
                "--input-format",
                "stream-json",
                "--verbose"
            ]
        );
    }

    #[test]
    fn test_build_args_full() {
        let mut tool_servers = BTreeMap::new();
        tool_servers.insert(
            "sequential-thinking".to_string(),
            ToolServerConfig::Stdio {
                command: "npx".to_string(),
                args: vec!["-y".to_string()],
                env: HashMap::new(),
            },
        );
        let options = AgentOptions {
            cwd: Some("/work".to_string()),
            system_prompt: Some("Be brief.".to_string()),
            allowed_tools: vec!["Read".to_string(), "Bash".to_string()],
            resume: Some("sess-1".to_string()),
            model: Some("claude-sonnet-4".to_string()),
            tool_servers,
        };

        let args = build_args(&options).unwrap();
        let after = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };
        assert_eq!(after("--system-prompt"), "Be brief.");
        assert_eq!(after("--allowedTools"), "Read,Bash");
        assert_eq!(after("--resume"), "sess-1");
        assert_eq!(after("--model"), "claude-sonnet-4");

        let mcp: serde_json::Value = serde_json::from_str(&after("--mcp-config")).unwrap();
        assert_eq!(mcp["mcpServers"]["sequential-thinking"]["command"], "npx");
    }

    #[tokio::test]
    async fn test_connect_nonexistent_cli_returns_error() {
        let mut client = SubprocessClient::new(
            "/nonexistent/binary/that/does/not/exist",
            AgentOptions::default(),
        );
        let err = client.connect().await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"), "{err}");
    }

    #[tokio::test]
    async fn test_query_before_connect_fails() {
        let mut client = SubprocessClient::new("cat", AgentOptions::default());
        assert!(client.query("hi").await.is_err());

        let first = client.receive_messages().next().await.unwrap();
        assert!(first.is_err());
    }

    #[cfg(unix)]
    fn fake_cli(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-agent");
        std::fs::write(&path, format!("#!/bin/sh\nread -r line\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_turn_yields_messages_and_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = fake_cli(
            &dir,
            r#"echo '{"type":"system","subtype":"init"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"hello"}]}}'
echo '{"type":"result","subtype":"success","session_id":"sess-9"}'"#,
        );

        let mut client = SubprocessClient::new(cli, AgentOptions::default());
        client.connect().await.unwrap();
        client.query("say hello").await.unwrap();

        let messages: Vec<_> = client.receive_response().collect().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].as_ref().unwrap(), &AgentMessage::text("hello"));
        assert_eq!(
            messages[1].as_ref().unwrap(),
            &AgentMessage::result("sess-9")
        );

        client.disconnect().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_nonzero_exit_is_stream_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = fake_cli(
            &dir,
            r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"partial"}]}}'
exit 3"#,
        );

        let mut client = SubprocessClient::new(cli, AgentOptions::default());
        client.connect().await.unwrap();
        client.query("go").await.unwrap();

        let messages: Vec<_> = client.receive_messages().collect().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_ok());
        let err = messages[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("exited"), "{err}");
    }
}
