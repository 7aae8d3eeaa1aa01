//! Credential store: user identity lookup and password verification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::password::{verify_missing_account, verify_password};
use crate::models::auth::{NewUser, Role, User, UserWithPassword};

/// Canonical form of an email address: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Persistence boundary for user identities.
///
/// Implementations normalize emails on every entry point and enforce email
/// uniqueness, returning [`AuthError::EmailTaken`] on conflict.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a user (with password hash) by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError>;

    /// Fetch a user by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Create a new user.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Stamp `last_login_at` with the current time.
    async fn record_login(&self, id: Uuid) -> Result<(), AuthError>;

    /// Set the active flag, returning the updated user if it exists.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError>;

    /// Check an email/password pair.
    ///
    /// Unknown email and wrong password both yield the same
    /// [`AuthError::InvalidCredentials`]. A correct password on a deactivated
    /// account yields [`AuthError::AccountDeactivated`].
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Some(found) = self.find_by_email(email).await? else {
            verify_missing_account(password);
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &found.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !found.user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        Ok(found.user)
    }
}

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user_with_password(self) -> Result<UserWithPassword, AuthError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| AuthError::Internal(format!("stored role: {e}")))?;
        Ok(UserWithPassword {
            user: User {
                id: self.id,
                email: self.email,
                name: self.name,
                role,
                is_active: self.is_active,
                last_login_at: self.last_login_at,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }

    fn into_user(self) -> Result<User, AuthError> {
        self.into_user_with_password().map(|u| u.user)
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role::text AS role, is_active, \
     last_login_at, created_at, updated_at";

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user_with_password).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, name, password_hash, role) \
             VALUES ($1, $2, $3, $4::user_role) RETURNING {USER_COLUMNS}"
        ))
        .bind(normalize_email(&new_user.email))
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::EmailTaken,
            other => AuthError::Db(other),
        })?;
        row.into_user()
    }

    async fn record_login(&self, id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_normalize_to_trimmed_lowercase() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
