//! Permission model for administrative operations.
//!
//! Gating is an explicit check at the top of each operation, returning a
//! typed result — not an implicit wrapper around control flow.

use serde::{Deserialize, Serialize};

/// Caller rank, ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Member,
    Moderator,
    Administrator,
    Owner,
}

impl Permission {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Administrator => "administrator",
            Self::Owner => "server owner",
        }
    }
}

/// Typed denial returned when the caller's rank is insufficient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("this operation requires {} permission", required.label())]
pub struct Denied {
    pub required: Permission,
}

/// Check that `actual` meets or exceeds `required`.
pub fn authorize(required: Permission, actual: Permission) -> Result<(), Denied> {
    if actual >= required {
        Ok(())
    } else {
        Err(Denied { required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(Permission::Owner > Permission::Administrator);
        assert!(Permission::Administrator > Permission::Moderator);
        assert!(Permission::Moderator > Permission::Member);
    }

    #[test]
    fn test_authorize_exact_and_higher_rank() {
        assert!(authorize(Permission::Moderator, Permission::Moderator).is_ok());
        assert!(authorize(Permission::Moderator, Permission::Owner).is_ok());
    }

    #[test]
    fn test_authorize_denies_lower_rank() {
        let err = authorize(Permission::Administrator, Permission::Member).unwrap_err();
        assert_eq!(err.required, Permission::Administrator);
        assert!(err.to_string().contains("administrator"));
    }

    #[test]
    fn test_owner_only_denies_administrator() {
        assert!(authorize(Permission::Owner, Permission::Administrator).is_err());
    }

    #[test]
    fn test_permission_serde() {
        assert_eq!(
            serde_json::to_string(&Permission::Administrator).unwrap(),
            "\"administrator\""
        );
    }
}
