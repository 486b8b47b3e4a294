//! Tenant identifiers and per-guild storage credentials.

use serde::{Deserialize, Serialize};

/// Opaque identifier for one guild (tenant). All state is partitioned by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Maximum length of a command name accepted by the platform.
pub const MAX_COMMAND_NAME_LEN: usize = 32;

/// A platform-legal dynamic command name: 1–32 chars of `[a-z0-9_-]`.
///
/// Names are case-sensitive by construction — uppercase input is rejected,
/// not folded, so two entries can never collide after normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandName(String);

/// Rejection reason for a candidate command name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCommandName {
    #[error("command name cannot be empty")]
    Empty,
    #[error("command name exceeds {MAX_COMMAND_NAME_LEN} characters")]
    TooLong,
    #[error("command name contains illegal character '{0}' (allowed: a-z, 0-9, '_', '-')")]
    IllegalChar(char),
}

impl CommandName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidCommandName> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidCommandName::Empty);
        }
        if name.len() > MAX_COMMAND_NAME_LEN {
            return Err(InvalidCommandName::TooLong);
        }
        if let Some(c) = name
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '_' | '-'))
        {
            return Err(InvalidCommandName::IllegalChar(c));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CommandName {
    type Err = InvalidCommandName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Where one guild's record lives in the remote store.
///
/// Created by the setup flow; absence means the guild is unconfigured and
/// every dependent operation must fail fast with setup guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key of the guild's record in the remote blob store.
    pub record_key: String,
    /// Access credential sent with every get/put for this record.
    pub master_key: String,
}
