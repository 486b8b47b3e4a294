//! The dynamic command registrar.
//!
//! Each mutating operation walks the same path: check the guild is
//! configured, validate the candidate source, bind it into an invocable
//! handler, publish the name to the platform registry, then persist the
//! entry. Registration and persistence are independent side effects — a
//! command that bound but did not persist works until restart, and the
//! caller is told so rather than the command being silently dropped.
//!
//! Operations on the same (guild, name) pair are not serialized here;
//! concurrent callers race with last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use forge_llm::{CodeGenerator, TextGenerator};
use forge_store::{GuildRepository, RecordStore};
use forge_types::{CommandFault, CommandName, DynamicCommandEntry, GuildId};

use crate::handler::{Invocation, ScriptHandler};
use crate::registry::CommandRegistry;
use crate::validator::Validator;

/// Whether the platform-side binding made it to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Persisted,
    /// Registered and invocable now, but the write was not acknowledged;
    /// the command will not survive a restart.
    BoundNotPersisted,
}

/// Successful outcome of a create, rename, or description update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCommand {
    pub name: CommandName,
    pub description: String,
    pub durability: Durability,
}

pub struct Registrar<S, R, G> {
    repo: Arc<GuildRepository<S>>,
    registry: R,
    generator: CodeGenerator<G>,
    validator: Validator,
    handlers: Mutex<HashMap<(GuildId, String), Arc<ScriptHandler>>>,
}

impl<S, R, G> Registrar<S, R, G>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    pub fn new(repo: Arc<GuildRepository<S>>, registry: R, generator: CodeGenerator<G>) -> Self {
        Self {
            repo,
            registry,
            generator,
            validator: Validator::new(),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn repo(&self) -> &GuildRepository<S> {
        &self.repo
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn generator(&self) -> &CodeGenerator<G> {
        &self.generator
    }

    /// Create a command from uploaded source.
    pub async fn create_from_source(
        &self,
        guild: GuildId,
        name: &str,
        code: &str,
        description: Option<String>,
    ) -> Result<CreatedCommand, CommandFault> {
        self.require_config(guild).await?;
        let description =
            description.unwrap_or_else(|| DynamicCommandEntry::default_description(name));
        self.create_checked(guild, name, code, description, false)
            .await
    }

    /// Create a command from a natural-language description: synthesize a
    /// draft, then run it through the same validate/bind/persist path.
    pub async fn create_from_description(
        &self,
        guild: GuildId,
        description: &str,
    ) -> Result<CreatedCommand, CommandFault> {
        self.require_config(guild).await?;
        let draft = self.generator.generate_command(description).await?;
        self.create_checked(guild, &draft.name, &draft.code, draft.description, true)
            .await
    }

    /// Delete a command. Platform-side removal tolerates "already absent";
    /// repository removal failure is reported without re-registering.
    pub async fn delete(&self, guild: GuildId, name: &str) -> Result<(), CommandFault> {
        self.require_config(guild).await?;
        if let Err(reason) = self.registry.remove(guild, name).await {
            warn!(%guild, name, %reason, "platform unregistration failed, continuing");
        }
        self.handlers
            .lock()
            .unwrap()
            .remove(&(guild, name.to_string()));
        if self.repo.remove_dynamic_command(guild, name).await {
            info!(%guild, name, "dynamic command deleted");
            Ok(())
        } else {
            Err(CommandFault::PersistenceFailure {
                operation: format!("removal of `{name}`"),
            })
        }
    }

    /// Rename as delete-then-create with the old entry's source. Not atomic:
    /// termination between the steps leaves the command absent under both
    /// names until recreated.
    pub async fn rename(
        &self,
        guild: GuildId,
        old_name: &str,
        new_name: &str,
    ) -> Result<CreatedCommand, CommandFault> {
        self.require_config(guild).await?;
        let new_name = CommandName::new(new_name).map_err(|e| CommandFault::InvalidName {
            reason: e.to_string(),
        })?;
        let entry = self
            .repo
            .load_guild_record(guild)
            .await
            .command(old_name)
            .cloned()
            .ok_or_else(|| CommandFault::UnknownCommand {
                name: old_name.to_string(),
            })?;
        self.delete(guild, old_name).await?;
        self.create_checked(guild, new_name.as_str(), &entry.code, entry.description, false)
            .await
    }

    /// Replace a command's description, re-validating and re-registering it.
    pub async fn update_description(
        &self,
        guild: GuildId,
        name: &str,
        description: &str,
    ) -> Result<CreatedCommand, CommandFault> {
        self.require_config(guild).await?;
        let entry = self
            .repo
            .load_guild_record(guild)
            .await
            .command(name)
            .cloned()
            .ok_or_else(|| CommandFault::UnknownCommand {
                name: name.to_string(),
            })?;
        self.create_checked(guild, name, &entry.code, description.to_string(), false)
            .await
    }

    /// Run a registered command and return the replies it produced.
    pub async fn invoke(
        &self,
        guild: GuildId,
        name: &str,
        invocation: Invocation,
    ) -> Result<Vec<String>, CommandFault> {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(&(guild, name.to_string()))
            .cloned()
            .ok_or_else(|| CommandFault::UnknownCommand {
                name: name.to_string(),
            })?;
        handler.invoke(invocation).await
    }

    /// (name, description) pairs of the guild's persisted commands.
    pub async fn list(&self, guild: GuildId) -> Vec<(String, String)> {
        self.repo
            .load_guild_record(guild)
            .await
            .dynamic_commands
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description.clone()))
            .collect()
    }

    pub fn is_bound(&self, guild: GuildId, name: &str) -> bool {
        self.handlers
            .lock()
            .unwrap()
            .contains_key(&(guild, name.to_string()))
    }

    /// Validate, bind, and register a persisted entry without writing it
    /// back. Used by reconciliation, where the store is the source of truth.
    pub(crate) async fn rebind(
        &self,
        guild: GuildId,
        name: &str,
        entry: &DynamicCommandEntry,
    ) -> Result<(), CommandFault> {
        let name = CommandName::new(name).map_err(|e| CommandFault::InvalidName {
            reason: e.to_string(),
        })?;
        self.validator.validate(&entry.code)?;
        let handler = ScriptHandler::bind(&entry.code)?;
        self.registry
            .register(guild, &name, &entry.description)
            .await
            .map_err(|e| CommandFault::BindingFailure {
                reason: format!("platform registration failed: {e}"),
                suggestion: None,
            })?;
        self.handlers
            .lock()
            .unwrap()
            .insert((guild, name.as_str().to_string()), Arc::new(handler));
        Ok(())
    }

    async fn require_config(&self, guild: GuildId) -> Result<(), CommandFault> {
        self.repo
            .storage_config(guild)
            .await
            .map(|_| ())
            .ok_or(CommandFault::ConfigurationMissing)
    }

    /// The shared validate → bind → register → persist path. Assumes the
    /// configuration check already ran.
    async fn create_checked(
        &self,
        guild: GuildId,
        name: &str,
        code: &str,
        description: String,
        generated: bool,
    ) -> Result<CreatedCommand, CommandFault> {
        let name = CommandName::new(name).map_err(|e| CommandFault::InvalidName {
            reason: e.to_string(),
        })?;

        if let Err(fault) = self.validator.validate(code) {
            return Err(self.with_suggestion(fault, code, generated).await);
        }

        let handler = match ScriptHandler::bind(code) {
            Ok(handler) => handler,
            Err(fault) => return Err(self.with_suggestion(fault, code, generated).await),
        };

        self.registry
            .register(guild, &name, &description)
            .await
            .map_err(|e| CommandFault::BindingFailure {
                reason: format!("platform registration failed: {e}"),
                suggestion: None,
            })?;
        self.handlers
            .lock()
            .unwrap()
            .insert((guild, name.as_str().to_string()), Arc::new(handler));

        let entry = DynamicCommandEntry {
            code: code.to_string(),
            description: description.clone(),
        };
        let durability = if self
            .repo
            .upsert_dynamic_command(guild, name.as_str(), entry)
            .await
        {
            info!(%guild, name = %name, "dynamic command created");
            Durability::Persisted
        } else {
            warn!(%guild, name = %name, "dynamic command bound but not persisted");
            Durability::BoundNotPersisted
        };

        Ok(CreatedCommand {
            name,
            description,
            durability,
        })
    }

    /// Attach an AI remediation hint to a rejection when one is warranted:
    /// always for binding failures, and for validation failures of
    /// generated code.
    async fn with_suggestion(
        &self,
        fault: CommandFault,
        code: &str,
        generated: bool,
    ) -> CommandFault {
        match fault {
            CommandFault::UnsafeCode {
                reason,
                suggestion: None,
            } if generated => {
                let suggestion = self.generator.suggest_fix(code, &reason).await;
                CommandFault::UnsafeCode { reason, suggestion }
            }
            CommandFault::BindingFailure {
                reason,
                suggestion: None,
            } => {
                let suggestion = self.generator.suggest_fix(code, &reason).await;
                CommandFault::BindingFailure { reason, suggestion }
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "registrar_tests.rs"]
mod tests;
