/// Storage collaborators
///
/// The session core never talks to a database directly. It consumes two
/// narrow contracts: user lookup and refresh-token persistence. Postgres
/// backs them in production, the in-memory variants back tests and local runs.

mod memory;
mod models;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;

pub use memory::{InMemoryRefreshTokenRepository, InMemoryUserStore};
pub use models::{NewUser, RefreshToken, User};
pub use postgres::{PgRefreshTokenRepository, PgUserStore};

/// User lookup and persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;

    /// Fails with `UniqueConstraintViolation` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    /// Returns `None` when no user has this id
    async fn update_user(&self, id: Uuid, changes: NewUser) -> Result<Option<User>, StorageError>;
}

/// Durable key-value persistence for refresh tokens, keyed by token value
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<(), StorageError>;

    async fn find(&self, token: &str) -> Result<Option<RefreshToken>, StorageError>;

    /// Overwrites `revoked_at`. Returns false when no record has this value.
    async fn set_revoked_at(&self, token: &str, at: DateTime<Utc>) -> Result<bool, StorageError>;
}
