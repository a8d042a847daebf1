use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;

/// Bytes left as-is in session file names; everything else is `%XX`
const FILE_STEM_ENCODE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// File stem of the empty key; a lone `%` never comes out of the encoder
const EMPTY_KEY_STEM: &str = "%";

/// Persisted session state for one conversation key
///
/// Serialized as the session file body:
/// `{"session_id", "cwd", "created_at", "last_updated"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Resumable agent session id; `None` until a turn completes or after a clear
    pub session_id: Option<String>,
    /// Working directory for the agent's file tools
    #[serde(default)]
    pub cwd: Option<String>,
    /// When the record was first written
    pub created_at: DateTime<Utc>,
    /// When the record was last written
    pub last_updated: DateTime<Utc>,
}

impl SessionRecord {
    /// Empty record stamped with `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: None,
            cwd: None,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Identifier scoping one session record
///
/// Any string or integer works as a key. The on-disk file name
/// percent-encodes characters outside `[A-Za-z0-9._-]`, so keys cannot
/// address paths outside the sessions directory and never collide.
///
/// # Examples
///
/// ```
/// use agentgate::session::ConversationKey;
///
/// assert_eq!(ConversationKey::from(42_i64).file_name(), "42.json");
/// assert_eq!(ConversationKey::from("../etc/passwd").file_name(), "..%2Fetc%2Fpasswd.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key used by the HTTP gateway when the request names no user
    pub const HTTP_DEFAULT: &'static str = "current";

    /// Key used by the terminal chat
    pub const CHAT_DEFAULT: &'static str = "current_session";

    /// Create a key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as given
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name holding this key's record
    ///
    /// Every byte outside `[A-Za-z0-9._-]` (including `%`) is
    /// percent-encoded, so distinct keys never share a file and no key can
    /// name a path outside the sessions directory. The empty key is stored
    /// as `%.json`.
    pub fn file_name(&self) -> String {
        if self.0.is_empty() {
            return format!("{}.json", EMPTY_KEY_STEM);
        }
        format!("{}.json", utf8_percent_encode(&self.0, FILE_STEM_ENCODE))
    }

    /// Recover the key from a file stem produced by [`Self::file_name`]
    ///
    /// Returns `None` if the stem does not decode to UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentgate::session::ConversationKey;
    ///
    /// let key = ConversationKey::from("alice@example.com");
    /// let name = key.file_name();
    /// let stem = name.strip_suffix(".json").unwrap();
    /// assert_eq!(ConversationKey::from_file_stem(stem), Some(key));
    /// ```
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        if stem == EMPTY_KEY_STEM {
            return Some(Self(String::new()));
        }
        percent_decode_str(stem)
            .decode_utf8()
            .ok()
            .map(|key| Self(key.into_owned()))
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ConversationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for ConversationKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl From<i64> for ConversationKey {
    fn from(key: i64) -> Self {
        Self(key.to_string())
    }
}

impl From<u64> for ConversationKey {
    fn from(key: u64) -> Self {
        Self(key.to_string())
    }
}
