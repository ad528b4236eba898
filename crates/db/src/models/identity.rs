//! Identity row model.

use serde::Serialize;
use sqlx::FromRow;
use workpulse_core::error::CoreError;
use workpulse_core::identity::Identity;
use workpulse_core::roles::Role;
use workpulse_core::types::{DbId, Timestamp};

/// A row from the `identities` table.
///
/// Carries credential fields; convert with
/// [`IdentityRow::into_identity`] before anything crosses the wire.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IdentityRow {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl IdentityRow {
    /// Convert to the public domain type, dropping credential fields.
    ///
    /// An unparseable role means the row predates (or postdates) this
    /// binary's role set and is an internal error, not bad input.
    pub fn into_identity(self) -> Result<Identity, CoreError> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            CoreError::Internal(format!("identity {} has unknown role '{}'", self.id, self.role))
        })?;
        Ok(Identity {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            role,
        })
    }
}
