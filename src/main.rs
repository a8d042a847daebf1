//! AgentGate - OpenAI-compatible gateway for a stream-json agent CLI
//!
#![doc = "AgentGate - OpenAI-compatible gateway for a stream-json agent CLI"]
#![doc = "Main entry point for the agentgate binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agentgate::cli::{Cli, Commands};
use agentgate::commands;
use agentgate::config::Config;
use agentgate::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => commands::serve::run_serve(config).await,
        Commands::Chat { resume, key } => commands::chat::run_chat(config, resume, key).await,
        Commands::Sessions { command } => {
            let store = SessionStore::new(config.sessions.resolve_dir()?);
            let default_dir = config.agent.default_working_directory();
            commands::sessions::handle_sessions(&store, command, &default_dir).await
        }
        Commands::SearchDirs {
            query,
            max_depth,
            limit,
            roots,
        } => {
            commands::search::handle_search(&query, roots, max_depth, limit);
            Ok(())
        }
    }
}

/// Initialize tracing with RUST_LOG support, falling back to `agentgate=info`
/// (or `agentgate=debug` with `--verbose`). Logs go to stderr so they never
/// interleave with chat output or command results on stdout.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "agentgate=debug"
    } else {
        "agentgate=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
