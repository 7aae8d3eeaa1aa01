//! Password policy and bcrypt hashing.

use std::sync::LazyLock;

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`].
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate and hash a plaintext password.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Hash checked when no account matches, so a miss costs one bcrypt
/// verification at [`BCRYPT_COST`] like a hit does.
static MISSING_ACCOUNT_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("missing-account", BCRYPT_COST).ok());

/// Run a full bcrypt verification for an email with no account. Always false.
pub fn verify_missing_account(password: &str) -> bool {
    if let Some(hash) = MISSING_ACCOUNT_HASH.as_deref() {
        let _ = bcrypt::verify(password, hash);
    }
    false
}
