//! Identity access roles.

use serde::{Deserialize, Serialize};

/// Access role attached to an [`Identity`](crate::identity::Identity).
///
/// Stored in the database as the lowercase string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standard,
    Admin,
    SuperUser,
}

impl Role {
    /// Lowercase string form used for storage and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Admin => "admin",
            Role::SuperUser => "super_user",
        }
    }

    /// Parse the storage form. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Role> {
        match name {
            "standard" => Some(Role::Standard),
            "admin" => Some(Role::Admin),
            "super_user" => Some(Role::SuperUser),
            _ => None,
        }
    }

    /// Whether this role may revoke another identity's session lease.
    pub fn can_revoke_leases(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperUser)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
