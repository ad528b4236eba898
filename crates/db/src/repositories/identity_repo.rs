//! Repository for the `identities` table (the Identity Directory).

use sqlx::PgPool;
use workpulse_core::types::DbId;

use crate::models::IdentityRow;

/// Column list for `identities` queries.
const IDENTITY_COLUMNS: &str =
    "id, email, display_name, role, password_hash, is_active, created_at, updated_at";

/// Lookup operations for identities. Creation and deletion are handled
/// by operational tooling, not this service.
pub struct IdentityRepo;

impl IdentityRepo {
    /// Find an identity by email (the login key).
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<IdentityRow>, sqlx::Error> {
        let query = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
        sqlx::query_as::<_, IdentityRow>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Find an identity by id (the resume key).
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<IdentityRow>, sqlx::Error> {
        let query = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
        sqlx::query_as::<_, IdentityRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all active identities ordered by display name.
    pub async fn list(pool: &PgPool) -> Result<Vec<IdentityRow>, sqlx::Error> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE is_active ORDER BY display_name"
        );
        sqlx::query_as::<_, IdentityRow>(&query).fetch_all(pool).await
    }
}
