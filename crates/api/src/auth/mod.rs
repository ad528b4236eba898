//! Credential verification and session-token hashing.
//!
//! Passwords are Argon2id PHC hashes. Session tokens are opaque
//! client-generated strings; only their SHA-256 hash is held in server
//! memory or written to logs, so a token never leaks through either.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use validator::ValidateEmail;
use workpulse_core::identity::Identity;
use workpulse_db::repositories::IdentityRepo;
use workpulse_db::DbPool;

use crate::error::{AppError, AppResult};

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string. Used by operational tooling
/// that provisions identities, and by tests.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Compute the SHA-256 hex digest of an opaque session token.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Look up and verify login credentials.
///
/// Returns `Ok(None)` uniformly for an unknown email, a deactivated
/// identity, or a wrong password, so the failure reason is not
/// distinguishable by the caller. Authentication failure is inline and
/// non-fatal: no state changes here.
pub async fn verify_credentials(
    pool: &DbPool,
    email: &str,
    password: &str,
) -> AppResult<Option<Identity>> {
    if !email.validate_email() {
        return Ok(None);
    }

    let Some(row) = IdentityRepo::find_by_email(pool, email).await? else {
        return Ok(None);
    };
    if !row.is_active {
        return Ok(None);
    }

    let valid = verify_password(password, &row.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        return Ok(None);
    }

    Ok(Some(row.into_identity()?))
}
