//! In-memory credential store for tests and local demos.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::AuthError;
use super::store::{CredentialStore, normalize_email};
use crate::models::auth::{NewUser, User, UserWithPassword};

/// Credential store backed by concurrent hash maps.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: DashMap<Uuid, UserWithPassword>,
    emails: DashMap<String, Uuid>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let Some(id) = self.emails.get(&normalize_email(email)).map(|r| *r) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|r| r.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|r| r.user.clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let email = normalize_email(&new_user.email);
        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => Err(AuthError::EmailTaken),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    id: Uuid::new_v4(),
                    email,
                    name: new_user.name,
                    role: new_user.role,
                    is_active: true,
                    last_login_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(
                    user.id,
                    UserWithPassword {
                        user: user.clone(),
                        password_hash: new_user.password_hash,
                    },
                );
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn record_login(&self, id: Uuid) -> Result<(), AuthError> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AuthError> {
        Ok(self.users.get_mut(&id).map(|mut entry| {
            entry.user.is_active = active;
            entry.user.updated_at = Utc::now();
            entry.user.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::models::auth::Role;

    fn new_user(email: &str, password: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: hash_password(password).unwrap(),
            role: Role::Viewer,
        }
    }

    #[tokio::test]
    async fn email_is_unique_case_insensitively() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("Bob@Example.com", "secret1")).await.unwrap();
        assert_eq!(user.email, "bob@example.com");

        let dup = store.create_user(new_user("bob@example.COM", "secret2")).await;
        assert!(matches!(dup, Err(AuthError::EmailTaken)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn verify_credentials_distinguishes_deactivation() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("c@example.com", "secret1")).await.unwrap();

        assert_eq!(
            store.verify_credentials("C@example.com", "secret1").await.unwrap().id,
            user.id
        );
        assert!(matches!(
            store.verify_credentials("c@example.com", "wrong!!").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            store.verify_credentials("nobody@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));

        store.set_active(user.id, false).await.unwrap();
        assert!(matches!(
            store.verify_credentials("c@example.com", "secret1").await,
            Err(AuthError::AccountDeactivated)
        ));
    }

    #[tokio::test]
    async fn record_login_stamps_timestamp() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("d@example.com", "secret1")).await.unwrap();
        assert!(user.last_login_at.is_none());

        store.record_login(user.id).await.unwrap();
        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login_at.is_some());
    }
}
