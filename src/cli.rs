//! Command-line interface definition for AgentGate
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for the HTTP gateway, terminal chat, session
//! management and working-directory search.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AgentGate - OpenAI-compatible gateway for a coding agent CLI
///
/// Serves the agent over `/v1/chat/completions`, or chats with it directly
/// in the terminal, resuming conversations across runs.
#[derive(Parser, Debug, Clone)]
#[command(name = "agentgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for AgentGate
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the OpenAI-compatible HTTP gateway
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat with the agent
    Chat {
        /// Resume the session saved by the previous chat
        #[arg(short = 'C', long = "continue")]
        resume: bool,

        /// Conversation key the session is stored under
        #[arg(short, long, default_value = "current_session")]
        key: String,
    },

    /// Inspect and manage saved sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Search for directories by name to use as a working directory
    SearchDirs {
        /// Case-insensitive substring of the directory name
        query: String,

        /// Maximum depth below each search root
        #[arg(long, default_value_t = 3)]
        max_depth: usize,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 15)]
        limit: usize,

        /// Search root (repeatable; defaults to the home directory and
        /// common system locations)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Show the record stored under a key
    Show {
        /// Conversation key
        key: String,
    },

    /// List every saved session
    List,

    /// Forget the session id, keeping the working directory
    Clear {
        /// Conversation key
        key: String,
    },

    /// Set the working directory for a key
    SetDir {
        /// Conversation key
        key: String,

        /// Existing directory
        path: PathBuf,
    },

    /// Print the working directory for a key
    GetDir {
        /// Conversation key
        key: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
