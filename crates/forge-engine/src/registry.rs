//! The platform command registry capability.
//!
//! The registry publishes names and descriptions to the platform; handler
//! dispatch stays process-local in the registrar, since the platform only
//! delivers invocation events back by name.

use std::future::Future;

use forge_types::{CommandName, GuildId};

pub trait CommandRegistry: Send + Sync + Clone + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Add or replace a command in the guild's namespace.
    fn register(
        &self,
        guild: GuildId,
        name: &CommandName,
        description: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove a command from the guild's namespace. Removing a command that
    /// is not registered succeeds.
    fn remove(
        &self,
        guild: GuildId,
        name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn exists(
        &self,
        guild: GuildId,
        name: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Publish the guild's current command set to end users.
    fn sync_guild(&self, guild: GuildId) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Publish the global command set.
    fn sync_global(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
