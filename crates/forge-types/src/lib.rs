//! Shared domain types for the forge dynamic-command stack.
//!
//! Everything here is plain data: identifiers, persisted record shapes,
//! the cross-crate error taxonomy, and the permission model. No I/O.

pub mod errors;
pub mod guild;
pub mod permissions;
pub mod record;

pub use errors::{CommandFault, SETUP_INSTRUCTIONS};
pub use guild::{CommandName, GuildId, InvalidCommandName, StorageConfig};
pub use permissions::{authorize, Denied, Permission};
pub use record::{DynamicCommandEntry, GuildRecord, RootIndex};
