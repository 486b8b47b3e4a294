//! Administrative operations: storage setup, command lifecycle, feature
//! settings. Every operation starts with an explicit permission check and
//! renders its outcome as user-facing text.

#[cfg(test)]
#[path = "admin_tests.rs"]
mod admin_tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use forge_engine::{CommandRegistry, Durability, Registrar};
use forge_llm::TextGenerator;
use forge_store::{GuildRepository, RecordStore};
use forge_types::{
    authorize, CommandFault, Denied, GuildId, Permission, StorageConfig,
};

pub const HELP_TEXT: &str = "\
Dynamic command administration:
  setup_storage <record_key> <master_key>   (owner) connect this server's record store
  create_command <name> <code>              (admin) upload a command script
  generate_command <description>            (admin) have the AI write a command
  delete_command <name>                     (admin) remove a command
  rename_command <old> <new>                (admin) rename a command
  set_description <name> <text>             (admin) change a command's description
  list_commands                             list this server's commands
  settings ...                              (admin) join/leave/boost channels, auto-role, moderation
  chat <question>                           ask the AI anything";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Denied(#[from] Denied),
    #[error(transparent)]
    Fault(#[from] CommandFault),
    #[error("{0}")]
    Rejected(String),
}

impl AdminError {
    /// Text addressed privately to the requester.
    pub fn user_message(&self) -> String {
        match self {
            Self::Denied(denied) => denied.to_string(),
            Self::Fault(fault) => fault.user_message(),
            Self::Rejected(reason) => reason.clone(),
        }
    }
}

/// One per-guild feature setting; `None` clears the setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "setting", content = "value", rename_all = "snake_case")]
pub enum FeatureSetting {
    JoinChannel(Option<u64>),
    LeaveChannel(Option<u64>),
    BoostChannel(Option<u64>),
    AutoRole(Option<u64>),
    JoinMessage(Option<String>),
    LeaveMessage(Option<String>),
    AiModeration(bool),
}

impl FeatureSetting {
    fn label(&self) -> &'static str {
        match self {
            Self::JoinChannel(_) => "join channel",
            Self::LeaveChannel(_) => "leave channel",
            Self::BoostChannel(_) => "boost channel",
            Self::AutoRole(_) => "auto-role",
            Self::JoinMessage(_) => "join message",
            Self::LeaveMessage(_) => "leave message",
            Self::AiModeration(_) => "AI moderation",
        }
    }

    fn apply(self, record: &mut forge_types::GuildRecord) {
        match self {
            Self::JoinChannel(v) => record.join_channel = v,
            Self::LeaveChannel(v) => record.leave_channel = v,
            Self::BoostChannel(v) => record.boost_channel = v,
            Self::AutoRole(v) => record.auto_role = v,
            Self::JoinMessage(v) => record.join_message = v,
            Self::LeaveMessage(v) => record.leave_message = v,
            Self::AiModeration(v) => record.ai_moderation = v,
        }
    }
}

pub struct AdminService<S, R, G> {
    registrar: Arc<Registrar<S, R, G>>,
}

impl<S, R, G> AdminService<S, R, G>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    pub fn new(registrar: Arc<Registrar<S, R, G>>) -> Self {
        Self { registrar }
    }

    pub fn registrar(&self) -> &Arc<Registrar<S, R, G>> {
        &self.registrar
    }

    fn repo(&self) -> &GuildRepository<S> {
        self.registrar.repo()
    }

    /// Verify the supplied credentials against the store, then record them
    /// in the root index. Owner only.
    pub async fn setup_storage(
        &self,
        caller: Permission,
        guild: GuildId,
        record_key: &str,
        master_key: &str,
    ) -> Result<String, AdminError> {
        authorize(Permission::Owner, caller)?;
        if !self.repo().store().probe(record_key, master_key).await {
            return Err(AdminError::Rejected(
                "Could not access the record with those credentials. \
                 Check the record key and master key and try again."
                    .to_string(),
            ));
        }
        let config = StorageConfig {
            record_key: record_key.to_string(),
            master_key: master_key.to_string(),
        };
        if !self.repo().set_storage_config(guild, config).await {
            return Err(CommandFault::PersistenceFailure {
                operation: "storage configuration".to_string(),
            }
            .into());
        }
        Ok("Storage configured. This server can now use dynamic commands.".to_string())
    }

    pub async fn create_command(
        &self,
        caller: Permission,
        guild: GuildId,
        name: &str,
        code: &str,
        description: Option<String>,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        let created = self
            .registrar
            .create_from_source(guild, name, code, description)
            .await?;
        Ok(render_created(&created))
    }

    pub async fn generate_command(
        &self,
        caller: Permission,
        guild: GuildId,
        description: &str,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        let created = self
            .registrar
            .create_from_description(guild, description)
            .await?;
        Ok(render_created(&created))
    }

    pub async fn delete_command(
        &self,
        caller: Permission,
        guild: GuildId,
        name: &str,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        self.registrar.delete(guild, name).await?;
        Ok(format!("Command `{name}` deleted."))
    }

    pub async fn rename_command(
        &self,
        caller: Permission,
        guild: GuildId,
        old_name: &str,
        new_name: &str,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        let created = self.registrar.rename(guild, old_name, new_name).await?;
        Ok(format!(
            "Command `{old_name}` renamed to `{}`.",
            created.name
        ))
    }

    pub async fn set_description(
        &self,
        caller: Permission,
        guild: GuildId,
        name: &str,
        description: &str,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        self.registrar
            .update_description(guild, name, description)
            .await?;
        Ok(format!("Description of `{name}` updated."))
    }

    pub async fn list_commands(
        &self,
        caller: Permission,
        guild: GuildId,
    ) -> Result<String, AdminError> {
        authorize(Permission::Member, caller)?;
        if self.repo().storage_config(guild).await.is_none() {
            return Err(CommandFault::ConfigurationMissing.into());
        }
        let commands = self.registrar.list(guild).await;
        if commands.is_empty() {
            return Ok("No dynamic commands yet.".to_string());
        }
        let lines: Vec<String> = commands
            .iter()
            .map(|(name, description)| format!("/{name} — {description}"))
            .collect();
        Ok(lines.join("\n"))
    }

    pub async fn set_feature(
        &self,
        caller: Permission,
        guild: GuildId,
        setting: FeatureSetting,
    ) -> Result<String, AdminError> {
        authorize(Permission::Administrator, caller)?;
        if self.repo().storage_config(guild).await.is_none() {
            return Err(CommandFault::ConfigurationMissing.into());
        }
        let label = setting.label();
        let mut record = self.repo().load_guild_record(guild).await;
        setting.apply(&mut record);
        if !self.repo().save_guild_record(guild, record).await {
            return Err(CommandFault::PersistenceFailure {
                operation: format!("{label} update"),
            }
            .into());
        }
        Ok(format!("Setting `{label}` updated."))
    }

    pub async fn chat(&self, caller: Permission, question: &str) -> Result<String, AdminError> {
        authorize(Permission::Member, caller)?;
        Ok(self.registrar.generator().chat(question).await?)
    }

    pub fn help(&self) -> &'static str {
        HELP_TEXT
    }
}

fn render_created(created: &forge_engine::CreatedCommand) -> String {
    match created.durability {
        Durability::Persisted => format!("Command `/{}` is live.", created.name),
        Durability::BoundNotPersisted => format!(
            "Command `/{}` is live. Command created but not saved — it will not survive a restart.",
            created.name
        ),
    }
}
