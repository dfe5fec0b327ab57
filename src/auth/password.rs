use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::StoreError;

lazy_static! {
    /// Verified against when a username is unknown, so a miss costs the same
    /// as a wrong password.
    static ref DUMMY_DIGEST: String =
        hash_password("riskstore-timing-equaliser").unwrap_or_default();
}

/// Hashes `plain` into a PHC string carrying algorithm, parameters and salt.
pub fn hash_password(plain: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            StoreError::Hashing(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Like [`verify_password`] but reports a digest that cannot be parsed.
pub fn try_verify_password(plain: &str, digest: &str) -> Result<bool, StoreError> {
    let parsed =
        PasswordHash::new(digest).map_err(|e| StoreError::MalformedCredential(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Returns false for a wrong password and for a malformed digest alike.
pub fn verify_password(plain: &str, digest: &str) -> bool {
    match try_verify_password(plain, digest) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "stored digest rejected");
            false
        }
    }
}

/// Burns one verification against a throwaway digest.
pub(crate) fn verify_dummy(plain: &str) {
    let _ = try_verify_password(plain, &DUMMY_DIGEST);
}
