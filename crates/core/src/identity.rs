//! The authenticated principal.

use serde::{Deserialize, Serialize};

use crate::roles::Role;
use crate::types::DbId;

/// Public identity record as seen by clients.
///
/// Credential fields (password hash, active flag) live only on the
/// database row model and never cross the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}
