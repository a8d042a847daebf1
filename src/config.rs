//! Configuration management for AgentGate
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::agent::{AgentOptions, ToolServerConfig};
use crate::cli::{Cli, Commands};
use crate::error::{AgentGateError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Main configuration structure for AgentGate
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
///
/// # Examples
///
/// ```
/// use agentgate::Config;
///
/// let config: Config = serde_yaml::from_str("server:\n  port: 9000\n").unwrap();
/// assert_eq!(config.server.port, 9000);
/// assert_eq!(config.agent.cli_path, "claude");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP gateway settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Agent process settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Session persistence settings
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8003
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Agent process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent CLI executable (name on `PATH` or absolute path)
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Model passed to the agent; the agent's own default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// System prompt for every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Tools the agent may use without asking
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,

    /// Working directory used when a conversation has none stored;
    /// the process's current directory when unset
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Auxiliary tool servers handed to the agent
    #[serde(default = "default_tool_servers")]
    pub tool_servers: BTreeMap<String, ToolServerConfig>,
}

fn default_cli_path() -> String {
    "claude".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Bash", "Edit", "mcp__sequential-thinking"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tool_servers() -> BTreeMap<String, ToolServerConfig> {
    let mut servers = BTreeMap::new();
    servers.insert(
        "sequential-thinking".to_string(),
        ToolServerConfig::Stdio {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-sequential-thinking".to_string(),
            ],
            env: HashMap::new(),
        },
    );
    servers
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            model: None,
            system_prompt: default_system_prompt(),
            allowed_tools: default_allowed_tools(),
            working_directory: None,
            tool_servers: default_tool_servers(),
        }
    }
}

impl AgentConfig {
    /// Per-turn agent options for a conversation in `cwd`
    ///
    /// # Arguments
    ///
    /// * `cwd` - Working directory for the agent's file tools
    /// * `resume` - Session id to resume, if continuing
    pub fn options(&self, cwd: impl Into<String>, resume: Option<String>) -> AgentOptions {
        AgentOptions {
            cwd: Some(cwd.into()),
            system_prompt: if self.system_prompt.is_empty() {
                None
            } else {
                Some(self.system_prompt.clone())
            },
            allowed_tools: self.allowed_tools.clone(),
            resume,
            model: self.model.clone(),
            tool_servers: self.tool_servers.clone(),
        }
    }

    /// Configured default working directory, or the current directory
    pub fn default_working_directory(&self) -> String {
        if let Some(dir) = &self.working_directory {
            return dir.clone();
        }
        std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string())
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding session files; the user data directory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl SessionsConfig {
    /// Resolve the sessions directory
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Config`] if no directory is configured and
    /// the platform data directory cannot be determined.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        let proj_dirs = ProjectDirs::from("com", "agentgate", "agentgate").ok_or_else(|| {
            AgentGateError::Config("Could not determine data directory".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("sessions"))
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentGateError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AgentGateError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("AGENTGATE_HOST") {
            self.server.host = host;
        }

        // AGENTGATE_PORT takes precedence over the conventional PORT.
        for var in ["PORT", "AGENTGATE_PORT"] {
            if let Ok(port) = std::env::var(var) {
                if let Ok(value) = port.parse() {
                    self.server.port = value;
                } else {
                    tracing::warn!("Invalid {}: {}", var, port);
                }
            }
        }

        if let Ok(dir) = std::env::var("AGENTGATE_SESSIONS_DIR") {
            self.sessions.dir = Some(PathBuf::from(dir));
        }

        if let Ok(dir) = std::env::var("WORKING_DIRECTORY") {
            self.agent.working_directory = Some(dir);
        }

        if let Ok(cli_path) = std::env::var("AGENTGATE_CLI_PATH") {
            self.agent.cli_path = cli_path;
        }

        if let Ok(model) = std::env::var("AGENTGATE_MODEL") {
            self.agent.model = Some(model);
        }

        if let Ok(prompt) = std::env::var("AGENTGATE_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(AgentGateError::Config("server.host cannot be empty".to_string()).into());
        }

        if self.server.port == 0 {
            return Err(
                AgentGateError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.cli_path.trim().is_empty() {
            return Err(
                AgentGateError::Config("agent.cli_path cannot be empty".to_string()).into(),
            );
        }

        if self.agent.allowed_tools.iter().any(|t| t.trim().is_empty()) {
            return Err(AgentGateError::Config(
                "agent.allowed_tools cannot contain empty names".to_string(),
            )
            .into());
        }

        if let Some(dir) = &self.agent.working_directory {
            if dir.trim().is_empty() {
                return Err(AgentGateError::Config(
                    "agent.working_directory cannot be empty when set".to_string(),
                )
                .into());
            }
        }

        for (name, server) in &self.agent.tool_servers {
            if let ToolServerConfig::Stdio { command, .. } = server {
                if command.trim().is_empty() {
                    return Err(AgentGateError::Config(format!(
                        "agent.tool_servers.{}: command cannot be empty",
                        name
                    ))
                    .into());
                }
            }
        }

        Ok(())
    }
}
