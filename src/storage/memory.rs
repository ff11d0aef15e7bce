use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::models::{NewUser, RefreshToken, User};
use super::{RefreshTokenRepository, UserStore};
use crate::error::StorageError;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("in-memory store lock poisoned".to_string()))
}

/// Process-local user store
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let users = lock(&self.users)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let users = lock(&self.users)?;
        Ok(users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut users = lock(&self.users)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(StorageError::UniqueConstraintViolation(
                "users_email_key".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            hashed_password: user.hashed_password,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, changes: NewUser) -> Result<Option<User>, StorageError> {
        let mut users = lock(&self.users)?;
        if users
            .values()
            .any(|u| u.email == changes.email && u.id != id)
        {
            return Err(StorageError::UniqueConstraintViolation(
                "users_email_key".to_string(),
            ));
        }

        Ok(users.get_mut(&id).map(|user| {
            user.email = changes.email;
            user.hashed_password = changes.hashed_password;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

/// Process-local refresh token table
#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(&self, token: RefreshToken) -> Result<(), StorageError> {
        let mut tokens = lock(&self.tokens)?;
        if tokens.contains_key(&token.token) {
            return Err(StorageError::UniqueConstraintViolation(
                "refresh_tokens_pkey".to_string(),
            ));
        }
        tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<RefreshToken>, StorageError> {
        let tokens = lock(&self.tokens)?;
        Ok(tokens.get(token).cloned())
    }

    async fn set_revoked_at(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StorageError> {
        let mut tokens = lock(&self.tokens)?;
        match tokens.get_mut(token) {
            Some(record) => {
                record.revoked_at = Some(at);
                record.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
