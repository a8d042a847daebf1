//! Per-conversation session persistence
//!
//! Each [`ConversationKey`] maps to one pretty-printed JSON file in the
//! sessions directory holding a [`SessionRecord`]. Reads never fail: a
//! missing or unparseable file is treated as "no record" (the latter logged
//! at `WARN`). Writes replace the file in full via a temporary file and a
//! rename.
//!
//! There is no locking. Concurrent writers for the same key race and the
//! last rename wins.

use crate::error::{AgentGateError, Result};
use anyhow::Context;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub mod types;
pub use types::{ConversationKey, SessionRecord};

/// File-backed session store
///
/// # Examples
///
/// ```
/// use agentgate::session::SessionStore;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let store = SessionStore::new(dir.path());
///
/// store.save("alice", "sess-1", Some("/work")).await?;
/// assert_eq!(
///     store.load("alice").await,
///     Some(("sess-1".to_string(), Some("/work".to_string())))
/// );
///
/// store.clear("alice").await?;
/// assert_eq!(store.load("alice").await, None);
/// assert_eq!(store.get_directory("alice", "/tmp").await, "/work");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created on the first write.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`'s record
    pub fn path_for(&self, key: &ConversationKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Record the session id from a completed turn
    ///
    /// The new `session_id` always wins. `working_directory` replaces the
    /// stored directory only when given. `created_at` is kept from any
    /// existing record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Storage`] if the record cannot be written.
    pub async fn save(
        &self,
        key: impl Into<ConversationKey>,
        session_id: &str,
        working_directory: Option<&str>,
    ) -> Result<()> {
        let key = key.into();
        let now = Utc::now();
        let mut record = self
            .read_record(&key)
            .await
            .unwrap_or_else(|| SessionRecord::new(now));

        record.session_id = Some(session_id.to_string());
        if let Some(dir) = working_directory {
            record.cwd = Some(dir.to_string());
        }
        record.last_updated = now;

        self.write_record(&key, &record).await?;
        tracing::debug!(key = %key, session_id, "saved session");
        Ok(())
    }

    /// Resumable session for `key` as `(session_id, working_directory)`
    ///
    /// `None` when there is no record, the record is unparseable, or the
    /// record holds no session id.
    pub async fn load(&self, key: impl Into<ConversationKey>) -> Option<(String, Option<String>)> {
        let record = self.read_record(&key.into()).await?;
        let session_id = record.session_id?;
        Some((session_id, record.cwd))
    }

    /// Set the working directory, keeping any session id
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Storage`] if the record cannot be written.
    pub async fn set_directory(&self, key: impl Into<ConversationKey>, dir: &str) -> Result<()> {
        let key = key.into();
        let now = Utc::now();
        let mut record = self
            .read_record(&key)
            .await
            .unwrap_or_else(|| SessionRecord::new(now));

        record.cwd = Some(dir.to_string());
        record.last_updated = now;

        self.write_record(&key, &record).await?;
        tracing::debug!(key = %key, cwd = dir, "set session working directory");
        Ok(())
    }

    /// Stored working directory for `key`, or `default`
    pub async fn get_directory(&self, key: impl Into<ConversationKey>, default: &str) -> String {
        self.read_record(&key.into())
            .await
            .and_then(|record| record.cwd)
            .unwrap_or_else(|| default.to_string())
    }

    /// Drop the session id, keeping the working directory and creation time
    ///
    /// Does nothing when no parseable record exists.
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Storage`] if the record cannot be written.
    pub async fn clear(&self, key: impl Into<ConversationKey>) -> Result<()> {
        let key = key.into();
        let Some(mut record) = self.read_record(&key).await else {
            return Ok(());
        };

        record.session_id = None;
        record.last_updated = Utc::now();

        self.write_record(&key, &record).await?;
        tracing::debug!(key = %key, "cleared session");
        Ok(())
    }

    /// Full record for `key`, if one exists and parses
    pub async fn record(&self, key: impl Into<ConversationKey>) -> Option<SessionRecord> {
        self.read_record(&key.into()).await
    }

    /// Every parseable record, most recently updated first
    ///
    /// Keys are decoded from the file names. Unparseable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AgentGateError::Storage`] if the directory exists but cannot
    /// be listed.
    pub async fn list(&self) -> Result<Vec<(String, SessionRecord)>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AgentGateError::Storage(format!(
                    "failed to list {}: {}",
                    self.dir.display(),
                    e
                ))
                .into())
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentGateError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(ConversationKey::from_file_stem)
            else {
                tracing::warn!(path = %path.display(), "session file name is not a valid key; skipping");
                continue;
            };
            if let Some(record) = read_path(&path).await {
                records.push((key.as_str().to_string(), record));
            }
        }

        records.sort_by(|a, b| b.1.last_updated.cmp(&a.1.last_updated));
        Ok(records)
    }

    async fn read_record(&self, key: &ConversationKey) -> Option<SessionRecord> {
        read_path(&self.path_for(key)).await
    }

    async fn write_record(&self, key: &ConversationKey, record: &SessionRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create sessions directory")
            .map_err(|e| AgentGateError::Storage(format!("{:#}", e)))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(record).map_err(AgentGateError::from)?;

        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))
            .map_err(|e| AgentGateError::Storage(format!("{:#}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))
            .map_err(|e| AgentGateError::Storage(format!("{:#}", e)))?;
        Ok(())
    }
}

async fn read_path(path: &Path) -> Option<SessionRecord> {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable session file; treating as absent");
            return None;
        }
    };

    match serde_json::from_str(&body) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt session file; treating as absent");
            None
        }
    }
}
