//! Process-local command registry.
//!
//! The platform gateway owns the real slash-command transport and delivers
//! invocation events back to this process by name. This registry keeps the
//! authoritative in-process view of each guild's namespace and logs sync
//! points; a gateway integration consumes [`LocalRegistry::commands_for`]
//! to publish the set upstream.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use tracing::info;

use forge_engine::CommandRegistry;
use forge_types::{CommandName, GuildId};

#[derive(Clone, Default)]
pub struct LocalRegistry {
    commands: Arc<Mutex<HashMap<GuildId, BTreeMap<String, String>>>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// (name, description) pairs currently registered for a guild.
    pub fn commands_for(&self, guild: GuildId) -> Vec<(String, String)> {
        self.commands
            .lock()
            .unwrap()
            .get(&guild)
            .map(|cmds| {
                cmds.iter()
                    .map(|(name, desc)| (name.clone(), desc.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl CommandRegistry for LocalRegistry {
    type Error = Infallible;

    async fn register(
        &self,
        guild: GuildId,
        name: &CommandName,
        description: &str,
    ) -> Result<(), Infallible> {
        self.commands
            .lock()
            .unwrap()
            .entry(guild)
            .or_default()
            .insert(name.as_str().to_string(), description.to_string());
        Ok(())
    }

    async fn remove(&self, guild: GuildId, name: &str) -> Result<(), Infallible> {
        if let Some(cmds) = self.commands.lock().unwrap().get_mut(&guild) {
            cmds.remove(name);
        }
        Ok(())
    }

    async fn exists(&self, guild: GuildId, name: &str) -> Result<bool, Infallible> {
        Ok(self
            .commands
            .lock()
            .unwrap()
            .get(&guild)
            .is_some_and(|cmds| cmds.contains_key(name)))
    }

    async fn sync_guild(&self, guild: GuildId) -> Result<(), Infallible> {
        let count = self
            .commands
            .lock()
            .unwrap()
            .get(&guild)
            .map_or(0, |cmds| cmds.len());
        info!(%guild, count, "guild command set synced");
        Ok(())
    }

    async fn sync_global(&self) -> Result<(), Infallible> {
        let guilds = self.commands.lock().unwrap().len();
        info!(guilds, "global command set synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_remove_exists() {
        let registry = LocalRegistry::new();
        let guild = GuildId(1);
        let name = CommandName::new("ping").unwrap();

        registry.register(guild, &name, "replies pong").await.unwrap();
        assert!(registry.exists(guild, "ping").await.unwrap());
        assert_eq!(
            registry.commands_for(guild),
            vec![("ping".to_string(), "replies pong".to_string())]
        );

        registry.remove(guild, "ping").await.unwrap();
        assert!(!registry.exists(guild, "ping").await.unwrap());
        // Removing again is not an error.
        registry.remove(guild, "ping").await.unwrap();
    }
}
