//! Cross-crate failure taxonomy for the dynamic-command lifecycle.
//!
//! Every variant maps to a distinct user-visible outcome; none of them is
//! fatal to the host process. Serializable so admin surfaces can forward
//! the structured fault alongside the rendered text.

use serde::{Deserialize, Serialize};

/// Setup procedure shown whenever a guild has no storage configuration.
pub const SETUP_INSTRUCTIONS: &str = "This server has no storage configured yet.\n\
    1. Create an account at your JSON record host and create a new record\n\
    2. Copy the record key and master key\n\
    3. Have the server owner run `setup_storage` with those credentials\n\
    Your data is stored under your own account, not on the bot host.";

/// A failure in the dynamic-command lifecycle, classified per outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandFault {
    /// The guild has no StorageConfig; dependent operations short-circuit.
    #[error("storage not configured for this server")]
    ConfigurationMissing,

    /// The validator rejected the candidate source.
    #[error("unsafe code rejected: {reason}")]
    UnsafeCode {
        reason: String,
        /// AI-produced remediation, attached for generated code.
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },

    /// The generation adapter could not extract usable code or a name.
    #[error("command generation failed: {reason}")]
    GenerationFailure { reason: String },

    /// Validated code failed to bind into a callable `run` entry point.
    #[error("command binding failed: {reason}")]
    BindingFailure {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },

    /// The remote store rejected or never acknowledged a write.
    #[error("failed to persist {operation} after retries")]
    PersistenceFailure { operation: String },

    /// A live invocation of an already-registered command raised.
    #[error("command raised during invocation: {reason}")]
    HandlerRuntime { reason: String },

    /// The requested command does not exist in this guild.
    #[error("command `{name}` not found")]
    UnknownCommand { name: String },

    /// The candidate name is not a platform-legal identifier.
    #[error("invalid command name: {reason}")]
    InvalidName { reason: String },
}

impl CommandFault {
    /// Text addressed privately to the requester. ConfigurationMissing always
    /// carries the full setup procedure, never a bare error code.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfigurationMissing => SETUP_INSTRUCTIONS.to_string(),
            Self::UnsafeCode { reason, suggestion }
            | Self::BindingFailure { reason, suggestion } => match suggestion {
                Some(fix) => format!("{reason}\n\nSuggested fix:\n{fix}"),
                None => reason.clone(),
            },
            Self::PersistenceFailure { operation } => {
                format!("Failed to save {operation} — the change may not survive a restart.")
            }
            Self::HandlerRuntime { .. } => {
                "The command failed while running. The error has been logged.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True when the full detail belongs in server-side logs only and the
    /// requester gets the generic message from [`Self::user_message`].
    pub fn is_detail_server_side(&self) -> bool {
        matches!(self, Self::HandlerRuntime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_missing_message_includes_setup() {
        let msg = CommandFault::ConfigurationMissing.user_message();
        assert!(msg.contains("setup_storage"));
        assert!(msg.contains("master key"));
    }

    #[test]
    fn test_unsafe_code_message_includes_suggestion() {
        let fault = CommandFault::UnsafeCode {
            reason: "call to eval not allowed".to_string(),
            suggestion: Some("remove the eval call".to_string()),
        };
        let msg = fault.user_message();
        assert!(msg.contains("eval not allowed"));
        assert!(msg.contains("Suggested fix"));
    }

    #[test]
    fn test_handler_runtime_is_generic_to_user() {
        let fault = CommandFault::HandlerRuntime {
            reason: "division by zero at line 3".to_string(),
        };
        assert!(fault.is_detail_server_side());
        assert!(!fault.user_message().contains("division"));
    }

    #[test]
    fn test_persistence_failure_message_names_the_operation() {
        let fault = CommandFault::PersistenceFailure {
            operation: "removal of `ping`".to_string(),
        };
        let msg = fault.user_message();
        assert!(msg.contains("removal of `ping`"));
        // A failed delete or settings write must not claim a command was
        // created.
        assert!(!msg.contains("created"));
    }

    #[test]
    fn test_serde_tags_are_snake_case() {
        let json = serde_json::to_string(&CommandFault::ConfigurationMissing).unwrap();
        assert!(json.contains("\"configuration_missing\""));
        let fault = CommandFault::PersistenceFailure {
            operation: "guild record".to_string(),
        };
        let json = serde_json::to_string(&fault).unwrap();
        assert!(json.contains("\"persistence_failure\""));
        let back: CommandFault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }

    #[test]
    fn test_binding_failure_omits_absent_suggestion() {
        let fault = CommandFault::BindingFailure {
            reason: "no run".to_string(),
            suggestion: None,
        };
        let json = serde_json::to_string(&fault).unwrap();
        assert!(!json.contains("suggestion"));
    }
}
