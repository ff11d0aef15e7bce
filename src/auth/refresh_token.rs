/// Refresh Token Store
///
/// Refresh tokens are opaque 256-bit random values, hex encoded, persisted
/// with an expiry and a nullable revocation timestamp. Each token moves from
/// active to either expired (by time) or revoked (by request); both are terminal.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::{RefreshToken, RefreshTokenRepository};

const TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub enum RefreshTokenError {
    NotFound,
    Expired,
    Revoked,
    /// The OS random source could not produce a token
    Entropy(String),
    Storage(StorageError),
}

impl fmt::Display for RefreshTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTokenError::NotFound => write!(f, "Refresh token not found"),
            RefreshTokenError::Expired => write!(f, "Refresh token has expired"),
            RefreshTokenError::Revoked => write!(f, "Refresh token has been revoked"),
            RefreshTokenError::Entropy(msg) => write!(f, "Random source failed: {}", msg),
            RefreshTokenError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RefreshTokenError {}

impl From<StorageError> for RefreshTokenError {
    fn from(err: StorageError) -> Self {
        RefreshTokenError::Storage(err)
    }
}

/// Generate a new refresh token value
///
/// 32 bytes from the OS RNG, hex encoded (64 characters).
pub fn generate_refresh_token() -> Result<String, RefreshTokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| RefreshTokenError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    lifetime: Duration,
}

impl RefreshTokenStore {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>, lifetime: Duration) -> Self {
        Self {
            repository,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue and persist a token for `user_id`, returning the raw value
    ///
    /// This is the only place the raw value leaves the store.
    pub async fn issue(&self, user_id: Uuid) -> Result<String, RefreshTokenError> {
        let token = generate_refresh_token()?;
        let now = Utc::now();

        self.repository
            .insert(RefreshToken {
                token: token.clone(),
                user_id,
                created_at: now,
                updated_at: now,
                expires_at: now + self.lifetime,
                revoked_at: None,
            })
            .await?;

        tracing::debug!(user_id = %user_id, "Refresh token issued");
        Ok(token)
    }

    /// Look up the record for an exact token value
    pub async fn fetch(&self, token: &str) -> Result<RefreshToken, RefreshTokenError> {
        self.repository
            .find(token)
            .await?
            .ok_or(RefreshTokenError::NotFound)
    }

    pub fn validate(&self, record: &RefreshToken) -> Result<(), RefreshTokenError> {
        Self::validate_at(record, Utc::now())
    }

    /// Pure check of a record against `now`
    ///
    /// Revocation wins over expiry when both apply.
    pub fn validate_at(record: &RefreshToken, now: DateTime<Utc>) -> Result<(), RefreshTokenError> {
        if record.is_revoked() {
            return Err(RefreshTokenError::Revoked);
        }
        if record.is_expired_at(now) {
            return Err(RefreshTokenError::Expired);
        }
        Ok(())
    }

    /// Mark a token revoked. Revoking twice is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), RefreshTokenError> {
        let updated = self.repository.set_revoked_at(token, Utc::now()).await?;
        if !updated {
            return Err(RefreshTokenError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRefreshTokenRepository;

    fn store() -> RefreshTokenStore {
        RefreshTokenStore::new(
            Arc::new(InMemoryRefreshTokenRepository::new()),
            Duration::days(60),
        )
    }

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token().unwrap();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_refresh_token().unwrap());
    }

    #[tokio::test]
    async fn test_issue_persists_record() {
        let store = store();
        let user_id = Uuid::new_v4();

        let token = store.issue(user_id).await.unwrap();
        let record = store.fetch(&token).await.unwrap();

        assert_eq!(record.token, token);
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.expires_at - record.created_at, Duration::days(60));
        assert!(record.revoked_at.is_none());
        assert!(store.validate(&record).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_unknown_token() {
        let result = store().fetch("does-not-exist").await;
        assert!(matches!(result, Err(RefreshTokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_sixty_day_window() {
        let store = store();
        let token = store.issue(Uuid::new_v4()).await.unwrap();
        let record = store.fetch(&token).await.unwrap();
        let issued = record.created_at;

        assert!(RefreshTokenStore::validate_at(&record, issued + Duration::days(59)).is_ok());
        assert!(matches!(
            RefreshTokenStore::validate_at(&record, issued + Duration::days(60)),
            Err(RefreshTokenError::Expired)
        ));
        assert!(matches!(
            RefreshTokenStore::validate_at(&record, issued + Duration::days(61)),
            Err(RefreshTokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_revoke_is_terminal_and_idempotent() {
        let store = store();
        let token = store.issue(Uuid::new_v4()).await.unwrap();
        assert!(store.validate(&store.fetch(&token).await.unwrap()).is_ok());

        store.revoke(&token).await.unwrap();
        let record = store.fetch(&token).await.unwrap();
        assert!(matches!(store.validate(&record), Err(RefreshTokenError::Revoked)));

        store.revoke(&token).await.unwrap();
        let record = store.fetch(&token).await.unwrap();
        assert!(matches!(store.validate(&record), Err(RefreshTokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_revoked_beats_expired() {
        let store = store();
        let token = store.issue(Uuid::new_v4()).await.unwrap();
        store.revoke(&token).await.unwrap();
        let record = store.fetch(&token).await.unwrap();

        let later = record.expires_at + Duration::days(1);
        assert!(matches!(
            RefreshTokenStore::validate_at(&record, later),
            Err(RefreshTokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let result = store().revoke("does-not-exist").await;
        assert!(matches!(result, Err(RefreshTokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_revokes_both_succeed() {
        let store = store();
        let token = store.issue(Uuid::new_v4()).await.unwrap();

        let (first, second) = tokio::join!(store.revoke(&token), store.revoke(&token));
        assert!(first.is_ok());
        assert!(second.is_ok());

        let record = store.fetch(&token).await.unwrap();
        assert!(matches!(store.validate(&record), Err(RefreshTokenError::Revoked)));
    }
}
