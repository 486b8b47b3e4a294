//! Persisted record shapes: the root index and per-guild records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::guild::{GuildId, StorageConfig};

/// One dynamic command as stored in a guild's record.
///
/// The entry is the source of truth; the runtime binding is derived from it
/// and rebuilt at startup by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicCommandEntry {
    /// Script source. Must define `fn run(ctx)` — enforced by the validator.
    pub code: String,
    /// User-facing description shown in the command list.
    pub description: String,
}

impl DynamicCommandEntry {
    /// Default description used when none was supplied.
    pub fn default_description(name: &str) -> String {
        format!("Dynamic command: {name}")
    }
}

/// The full persisted JSON document for one guild.
///
/// Dynamic command names are kept as raw strings here so that a record
/// containing an entry with an illegal name still deserializes — the
/// registrar and reconciler decide what to do with such entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_channel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_channel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_channel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_role: Option<u64>,
    /// Welcome template. Supports `{user}` and `{server}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_message: Option<String>,
    #[serde(default)]
    pub ai_moderation: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_commands: BTreeMap<String, DynamicCommandEntry>,
    /// Keys written by other components are preserved across load/save.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl GuildRecord {
    pub fn command(&self, name: &str) -> Option<&DynamicCommandEntry> {
        self.dynamic_commands.get(name)
    }

    pub fn upsert_command(&mut self, name: impl Into<String>, entry: DynamicCommandEntry) {
        self.dynamic_commands.insert(name.into(), entry);
    }

    /// Remove a command entry. Returns false if it was already absent.
    pub fn remove_command(&mut self, name: &str) -> bool {
        self.dynamic_commands.remove(name).is_some()
    }
}

/// The single record mapping every guild to its storage configuration.
///
/// Guild ids are stored as decimal strings because JSON object keys must be
/// strings; accessors take and return [`GuildId`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootIndex {
    #[serde(default)]
    pub guild_bin_configs: BTreeMap<String, StorageConfig>,
}

impl RootIndex {
    pub fn get(&self, guild: GuildId) -> Option<&StorageConfig> {
        self.guild_bin_configs.get(&guild.to_string())
    }

    pub fn insert(&mut self, guild: GuildId, config: StorageConfig) {
        self.guild_bin_configs.insert(guild.to_string(), config);
    }

    /// All guilds present in the index, skipping unparseable keys.
    pub fn guilds(&self) -> Vec<GuildId> {
        self.guild_bin_configs
            .keys()
            .filter_map(|k| k.parse::<u64>().ok().map(GuildId))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str) -> DynamicCommandEntry {
        DynamicCommandEntry {
            code: code.to_string(),
            description: "desc".to_string(),
        }
    }

    #[test]
    fn test_guild_record_roundtrip_preserves_source_bytes() {
        let mut record = GuildRecord::default();
        record.upsert_command("ping", entry("fn run(ctx) { ctx.reply(\"pong\"); }"));
        let json = serde_json::to_string(&record).unwrap();
        let back: GuildRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.command("ping").unwrap().code,
            "fn run(ctx) { ctx.reply(\"pong\"); }"
        );
    }

    #[test]
    fn test_guild_record_empty_serializes_minimal() {
        let record = GuildRecord::default();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("dynamic_commands"));
        assert!(!json.contains("join_channel"));
    }

    #[test]
    fn test_guild_record_preserves_unknown_keys() {
        let json = r#"{"ai_moderation":true,"custom_widget":{"a":1}}"#;
        let record: GuildRecord = serde_json::from_str(json).unwrap();
        assert!(record.ai_moderation);
        let out = serde_json::to_string(&record).unwrap();
        assert!(out.contains("custom_widget"));
    }

    #[test]
    fn test_remove_command_is_idempotent() {
        let mut record = GuildRecord::default();
        record.upsert_command("ping", entry("x"));
        assert!(record.remove_command("ping"));
        assert!(!record.remove_command("ping"));
    }

    #[test]
    fn test_root_index_accessors() {
        let mut index = RootIndex::default();
        let cfg = StorageConfig {
            record_key: "k".to_string(),
            master_key: "m".to_string(),
        };
        index.insert(GuildId(7), cfg.clone());
        assert_eq!(index.get(GuildId(7)), Some(&cfg));
        assert_eq!(index.get(GuildId(8)), None);
        assert_eq!(index.guilds(), vec![GuildId(7)]);
    }

    #[test]
    fn test_root_index_skips_unparseable_guild_keys() {
        let json = r#"{"guild_bin_configs":{"not-a-number":{"record_key":"k","master_key":"m"}}}"#;
        let index: RootIndex = serde_json::from_str(json).unwrap();
        assert!(index.guilds().is_empty());
    }
}
