//! Persisted bot settings: the limited-mode flag and the chat allow-list.
//!
//! The whole document lives in one JSON file that is rewritten wholesale on
//! every mutation. A missing or malformed file yields the defaults; writes go
//! through a sibling temp file followed by a rename so a crash mid-write
//! leaves the previous document intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, warn};

/// A chat reference accepted by `/allow_chat`: a numeric id or a @username
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum ChatRef {
    /// Numeric chat identifier
    Id(i64),
    /// Public @username of a chat
    Username(String),
}

/// Rejection for inputs that are neither numeric nor a @username
#[derive(Error, Debug, PartialEq, Eq)]
#[error("chat must be a numeric id or start with @")]
pub struct ChatRefParseError;

impl FromStr for ChatRef {
    type Err = ChatRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix('@') {
            if rest.is_empty() {
                return Err(ChatRefParseError);
            }
            return Ok(Self::Username(s.to_string()));
        }
        s.parse::<i64>().map(Self::Id).map_err(|_| ChatRefParseError)
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// The persisted settings document
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BotSettings {
    /// When set, the bot only reacts inside allowed chats
    #[serde(default)]
    pub limited_mode: bool,
    /// Chats the bot may react in while limited mode is on
    #[serde(default)]
    pub allowed_chats: BTreeSet<ChatRef>,
}

/// On-disk store for [`BotSettings`]
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: BotSettings,
}

impl SettingsStore {
    /// Load the store from `path`, substituting defaults when the file is
    /// absent or malformed. Read and parse failures are logged, never
    /// propagated.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(
                        "Malformed settings file {}: {e}. Using defaults.",
                        path.display()
                    );
                    BotSettings::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BotSettings::default(),
            Err(e) => {
                warn!(
                    "Could not read settings file {}: {e}. Using defaults.",
                    path.display()
                );
                BotSettings::default()
            }
        };
        Self { path, current }
    }

    /// Current snapshot of the document
    #[must_use]
    pub fn settings(&self) -> &BotSettings {
        &self.current
    }

    #[must_use]
    pub fn limited_mode(&self) -> bool {
        self.current.limited_mode
    }

    /// Flip limited mode, persist, and return the new value
    pub fn toggle_limited_mode(&mut self) -> bool {
        self.current.limited_mode = !self.current.limited_mode;
        self.save();
        self.current.limited_mode
    }

    /// Add a chat to the allow-list and persist. Returns `false` when the
    /// chat was already present (nothing is written in that case).
    pub fn allow_chat(&mut self, chat: ChatRef) -> bool {
        let inserted = self.current.allowed_chats.insert(chat);
        if inserted {
            self.save();
        }
        inserted
    }

    /// Whether a chat is in the allow-list, by id or by @username
    #[must_use]
    pub fn is_chat_allowed(&self, id: i64, username: Option<&str>) -> bool {
        if self.current.allowed_chats.contains(&ChatRef::Id(id)) {
            return true;
        }
        username.is_some_and(|name| {
            self.current
                .allowed_chats
                .contains(&ChatRef::Username(format!("@{name}")))
        })
    }

    /// Persist the current document. Failure is logged and otherwise ignored.
    pub fn save(&self) {
        if let Err(e) = self.write_atomic() {
            error!("Failed to save settings to {}: {e}", self.path.display());
        }
    }

    fn write_atomic(&self) -> io::Result<()> {
        let body = serde_json::to_string_pretty(&self.current)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }
}
