//! Authentication and authorization logic.
//!
//! Provides password hashing, the token service, and the credential store
//! shared by `vantage_api` and anything else that needs to authenticate a
//! subject.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod store;

use thiserror::Error;

pub use jwt::{TokenConfig, TokenService};
pub use memory::MemoryCredentialStore;
pub use store::{CredentialStore, PgCredentialStore};

/// Why a token was rejected.
///
/// Callers outside this crate only ever see the generic
/// [`AuthError::InvalidToken`] message; the kind is kept for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("wrong token type")]
    WrongKind,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account deactivated")]
    AccountDeactivated,

    #[error("Invalid or expired token")]
    InvalidToken(TokenError),

    #[error("User not found")]
    SubjectNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::InvalidToken(e)
    }
}
