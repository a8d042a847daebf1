use crate::cli::SessionCommand;
use crate::error::{AgentGateError, Result};
use crate::session::{SessionRecord, SessionStore};
use colored::Colorize;
use prettytable::{format, Table};
use std::path::Path;

/// Handle `sessions` subcommands
///
/// # Arguments
///
/// * `store` - Session store to operate on
/// * `command` - Subcommand to run
/// * `default_dir` - Directory reported by `get-dir` when none is stored
///
/// # Errors
///
/// Returns error if `set-dir` is given a path that is not an existing
/// directory, or if the store cannot be written or listed.
pub async fn handle_sessions(
    store: &SessionStore,
    command: SessionCommand,
    default_dir: &str,
) -> Result<()> {
    match command {
        SessionCommand::Show { key } => match store.record(key.as_str()).await {
            Some(record) => print_record(&key, &record),
            None => println!("{}", format!("No session stored for '{}'.", key).yellow()),
        },
        SessionCommand::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("{}", "No saved sessions found.".yellow());
                return Ok(());
            }
            println!("\nSaved sessions ({}):", store.dir().display());
            records_table(&records).printstd();
            println!();
        }
        SessionCommand::Clear { key } => {
            store.clear(key.as_str()).await?;
            println!(
                "{}",
                format!("Cleared session for '{}' (working directory kept).", key).green()
            );
        }
        SessionCommand::SetDir { key, path } => {
            let absolute = resolve_directory(&path)?;
            store.set_directory(key.as_str(), &absolute).await?;
            println!(
                "{}",
                format!("Working directory for '{}' set to {}", key, absolute).green()
            );
        }
        SessionCommand::GetDir { key } => {
            println!("{}", store.get_directory(key.as_str(), default_dir).await);
        }
    }
    Ok(())
}

/// Check that `path` is an existing directory and return it as an absolute path
///
/// # Errors
///
/// Returns [`AgentGateError::InvalidRequest`] if the path does not exist, is
/// not a directory, or is not valid UTF-8.
pub fn resolve_directory(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(AgentGateError::InvalidRequest(format!(
            "Path does not exist: {} (try `agentgate search-dirs`)",
            path.display()
        ))
        .into());
    }
    if !path.is_dir() {
        return Err(AgentGateError::InvalidRequest(format!(
            "Path is not a directory: {}",
            path.display()
        ))
        .into());
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    absolute.to_str().map(str::to_string).ok_or_else(|| {
        AgentGateError::InvalidRequest(format!(
            "Path is not valid UTF-8: {}",
            absolute.display()
        ))
        .into()
    })
}

fn print_record(key: &str, record: &SessionRecord) {
    println!("Key:          {}", key.cyan());
    println!(
        "Session:      {}",
        record.session_id.as_deref().unwrap_or("-")
    );
    println!("Directory:    {}", record.cwd.as_deref().unwrap_or("-"));
    println!(
        "Created:      {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Last updated: {}",
        record.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn records_table(records: &[(String, SessionRecord)]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Key".bold(),
        "Session".bold(),
        "Directory".bold(),
        "Last Updated".bold()
    ]);

    for (key, record) in records {
        let session = match &record.session_id {
            Some(id) if id.chars().count() > 12 => {
                format!("{}...", id.chars().take(12).collect::<String>())
            }
            Some(id) => id.clone(),
            None => "-".to_string(),
        };
        table.add_row(prettytable::row![
            key.cyan(),
            session,
            record.cwd.as_deref().unwrap_or("-"),
            record.last_updated.format("%Y-%m-%d %H:%M").to_string()
        ]);
    }
    table
}
