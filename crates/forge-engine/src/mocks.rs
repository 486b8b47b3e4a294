//! Mock command registry for tests.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! forge-engine = { path = "...", features = ["test-support"] }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use forge_types::{CommandName, GuildId};

use crate::registry::CommandRegistry;

/// In-memory registry that records registrations and sync calls.
#[derive(Clone, Default)]
pub struct MockRegistry {
    commands: Arc<Mutex<HashMap<GuildId, BTreeMap<String, String>>>>,
    guild_syncs: Arc<Mutex<Vec<GuildId>>>,
    global_syncs: Arc<AtomicUsize>,
    fail_register: Arc<AtomicBool>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names currently registered for the guild, sorted.
    pub fn registered(&self, guild: GuildId) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .get(&guild)
            .map(|cmds| cmds.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn description_of(&self, guild: GuildId, name: &str) -> Option<String> {
        self.commands
            .lock()
            .unwrap()
            .get(&guild)
            .and_then(|cmds| cmds.get(name).cloned())
    }

    pub fn guild_syncs(&self) -> Vec<GuildId> {
        self.guild_syncs.lock().unwrap().clone()
    }

    pub fn global_sync_count(&self) -> usize {
        self.global_syncs.load(Ordering::SeqCst)
    }

    /// Simulate the platform rejecting registrations.
    pub fn deny_register(&self) {
        self.fail_register.store(true, Ordering::SeqCst);
    }

    pub fn allow_register(&self) {
        self.fail_register.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockRegistryError(pub &'static str);

impl std::fmt::Display for MockRegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockRegistryError {}

impl CommandRegistry for MockRegistry {
    type Error = MockRegistryError;

    async fn register(
        &self,
        guild: GuildId,
        name: &CommandName,
        description: &str,
    ) -> Result<(), MockRegistryError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(MockRegistryError("platform rejected the registration"));
        }
        self.commands
            .lock()
            .unwrap()
            .entry(guild)
            .or_default()
            .insert(name.as_str().to_string(), description.to_string());
        Ok(())
    }

    async fn remove(&self, guild: GuildId, name: &str) -> Result<(), MockRegistryError> {
        if let Some(cmds) = self.commands.lock().unwrap().get_mut(&guild) {
            cmds.remove(name);
        }
        Ok(())
    }

    async fn exists(&self, guild: GuildId, name: &str) -> Result<bool, MockRegistryError> {
        Ok(self
            .commands
            .lock()
            .unwrap()
            .get(&guild)
            .is_some_and(|cmds| cmds.contains_key(name)))
    }

    async fn sync_guild(&self, guild: GuildId) -> Result<(), MockRegistryError> {
        self.guild_syncs.lock().unwrap().push(guild);
        Ok(())
    }

    async fn sync_global(&self) -> Result<(), MockRegistryError> {
        self.global_syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
