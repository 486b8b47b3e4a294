//! Per-guild record repository: root index, credentials, write-through cache.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{info, warn};

use forge_types::{DynamicCommandEntry, GuildId, GuildRecord, RootIndex, StorageConfig};

use crate::store::{JsonObject, RecordStore};

/// Guild-partitioned view over a [`RecordStore`].
///
/// The root record (addressed by the service-level key pair) maps each guild
/// to its own record key and credential. Guild records are cached after first
/// load and updated optimistically on save: the cache always reflects the
/// latest accepted state, even when the remote write was not acknowledged.
/// The root index itself is never cached — every credential lookup re-fetches
/// it, so configs added by another process are visible immediately.
pub struct GuildRepository<S> {
    store: S,
    root_record_key: String,
    root_master_key: String,
    cache: Mutex<HashMap<GuildId, GuildRecord>>,
}

impl<S: RecordStore> GuildRepository<S> {
    pub fn new(store: S, root_record_key: impl Into<String>, root_master_key: impl Into<String>) -> Self {
        Self {
            store,
            root_record_key: root_record_key.into(),
            root_master_key: root_master_key.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch and parse the root index. An unreachable store and a genuinely
    /// empty index both come back as the default — the store contract does
    /// not distinguish them.
    pub async fn root_index(&self) -> RootIndex {
        let raw = self
            .store
            .fetch(&self.root_record_key, &self.root_master_key)
            .await;
        match serde_json::from_value(Value::Object(raw)) {
            Ok(index) => index,
            Err(reason) => {
                warn!(%reason, "root index did not parse, treating as empty");
                RootIndex::default()
            }
        }
    }

    /// The guild's storage credentials, or None when unconfigured.
    pub async fn storage_config(&self, guild: GuildId) -> Option<StorageConfig> {
        self.root_index().await.get(guild).cloned()
    }

    /// Record the guild's credentials in the root index. Returns whether the
    /// updated index was acknowledged by the store.
    pub async fn set_storage_config(&self, guild: GuildId, config: StorageConfig) -> bool {
        let mut index = self.root_index().await;
        index.insert(guild, config);
        let Some(raw) = to_object(&index) else {
            return false;
        };
        let ok = self
            .store
            .put(&self.root_record_key, &self.root_master_key, &raw)
            .await;
        if ok {
            info!(%guild, "storage config registered");
        }
        ok
    }

    /// The guild's record, from cache when warm, otherwise fetched and
    /// cached. An unconfigured guild gets a default record; the caller
    /// decides whether that situation is an error.
    pub async fn load_guild_record(&self, guild: GuildId) -> GuildRecord {
        if let Some(record) = self.cache.lock().unwrap().get(&guild) {
            return record.clone();
        }
        let record = match self.storage_config(guild).await {
            Some(config) => {
                let raw = self.store.fetch(&config.record_key, &config.master_key).await;
                match serde_json::from_value(Value::Object(raw)) {
                    Ok(record) => record,
                    Err(reason) => {
                        warn!(%guild, %reason, "guild record did not parse, starting empty");
                        GuildRecord::default()
                    }
                }
            }
            None => GuildRecord::default(),
        };
        self.cache
            .lock()
            .unwrap()
            .insert(guild, record.clone());
        record
    }

    /// Accept `record` as the guild's current state and attempt to persist
    /// it. The cache is updated before the write is attempted and is not
    /// rolled back on failure: callers that got `false` must surface the
    /// durability gap to the user instead.
    pub async fn save_guild_record(&self, guild: GuildId, record: GuildRecord) -> bool {
        self.cache.lock().unwrap().insert(guild, record.clone());
        let Some(config) = self.storage_config(guild).await else {
            warn!(%guild, "save skipped, guild has no storage config");
            return false;
        };
        let Some(raw) = to_object(&record) else {
            return false;
        };
        let ok = self
            .store
            .put(&config.record_key, &config.master_key, &raw)
            .await;
        if !ok {
            warn!(%guild, "guild record write not acknowledged, cache is ahead of store");
        }
        ok
    }

    /// Add or replace one dynamic command entry. Returns durability.
    pub async fn upsert_dynamic_command(
        &self,
        guild: GuildId,
        name: &str,
        entry: DynamicCommandEntry,
    ) -> bool {
        let mut record = self.load_guild_record(guild).await;
        record.upsert_command(name, entry);
        self.save_guild_record(guild, record).await
    }

    /// Remove one dynamic command entry. Removing an absent entry succeeds
    /// without a store round trip, so the operation is idempotent.
    pub async fn remove_dynamic_command(&self, guild: GuildId, name: &str) -> bool {
        let mut record = self.load_guild_record(guild).await;
        if !record.remove_command(name) {
            return true;
        }
        self.save_guild_record(guild, record).await
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> Option<JsonObject> {
    match serde_json::to_value(value) {
        Ok(Value::Object(obj)) => Some(obj),
        Ok(other) => {
            warn!("record serialized to non-object {other}, refusing to write");
            None
        }
        Err(reason) => {
            warn!(%reason, "record failed to serialize");
            None
        }
    }
}
