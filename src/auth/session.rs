//! Session orchestration.
//!
//! `SessionService` sequences the credential hasher, the access token codec
//! and the refresh token store into the user-facing flows. Request-shape
//! checks run first; primitive failures are translated into `AppError`
//! here and nowhere else.

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::credentials::bearer_token;
use crate::auth::jwt::{AccessTokenCodec, TokenError};
use crate::auth::password::{HashError, PasswordHasher};
use crate::auth::refresh_token::{RefreshTokenError, RefreshTokenStore};
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::error::{
    AppError, AuthError, CredentialFailure, DependencyError, ErrorContext, StorageError,
    TokenRejection,
};
use crate::storage::{NewUser, RefreshTokenRepository, User, UserStore};
use crate::validators::{is_valid_email, is_valid_password, required};

/// Tokens handed out by a successful login
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    codec: AccessTokenCodec,
    refresh_tokens: RefreshTokenStore,
    access_token_lifetime: Duration,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: RefreshTokenStore,
        hasher: PasswordHasher,
        codec: AccessTokenCodec,
        access_token_lifetime: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            codec,
            refresh_tokens,
            access_token_lifetime,
        }
    }

    /// Wire the service from configuration and storage collaborators
    pub fn from_settings(
        jwt: &JwtSettings,
        password: &PasswordSettings,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenRepository>,
    ) -> Result<Self, HashError> {
        Ok(Self::new(
            users,
            RefreshTokenStore::new(tokens, Duration::seconds(jwt.refresh_token_expiry)),
            PasswordHasher::new(password.bcrypt_cost)?,
            AccessTokenCodec::from_settings(jwt),
            Duration::seconds(jwt.access_token_expiry),
        ))
    }

    pub fn access_token_lifetime(&self) -> Duration {
        self.access_token_lifetime
    }

    /// Create an account
    pub async fn register(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let context = ErrorContext::new("register");
        let result = self.register_inner(email, password).await;
        match &result {
            Ok(user) => tracing::info!(
                request_id = %context.request_id,
                user_id = %user.id,
                "User registered"
            ),
            Err(e) => context.log_error(e),
        }
        result
    }

    async fn register_inner(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let email = is_valid_email(required(email, "email")?)?;
        let password = is_valid_password(required(password, "password")?)?;

        let hashed_password = self.hash_password(password).await?;

        self.users
            .create_user(NewUser {
                email,
                hashed_password,
            })
            .await
            .map_err(conflict_on_duplicate)
    }

    /// Check a password and open a session
    ///
    /// Unknown email and wrong password are reported identically.
    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginOutcome, AppError> {
        let context = ErrorContext::new("login");
        let result = self.login_inner(email, password).await;
        match &result {
            Ok(outcome) => tracing::info!(
                request_id = %context.request_id,
                user_id = %outcome.user.id,
                "User logged in"
            ),
            Err(e) => context.log_error(e),
        }
        result
    }

    async fn login_inner(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginOutcome, AppError> {
        let email = is_valid_email(required(email, "email")?)?;
        let password = required(password, "password")?;

        let user = match self.users.get_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.burn_verification(password).await;
                return Err(AuthError::InvalidCredentials(CredentialFailure::UnknownUser).into());
            }
        };

        if !self.verify_password(password, &user.hashed_password).await? {
            return Err(AuthError::InvalidCredentials(CredentialFailure::WrongPassword).into());
        }

        let access_token = self
            .codec
            .issue(user.id, self.access_token_lifetime)
            .map_err(token_error)?;
        let refresh_token = self
            .refresh_tokens
            .issue(user.id)
            .await
            .map_err(refresh_token_error)?;

        Ok(LoginOutcome {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a presented refresh token
    ///
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, authorization: Option<&str>) -> Result<String, AppError> {
        let context = ErrorContext::new("refresh");
        let result = self.refresh_inner(authorization).await;
        match &result {
            Ok((user_id, _)) => tracing::info!(
                request_id = %context.request_id,
                user_id = %user_id,
                "Access token refreshed"
            ),
            Err(e) => context.log_error(e),
        }
        result.map(|(_, token)| token)
    }

    async fn refresh_inner(&self, authorization: Option<&str>) -> Result<(Uuid, String), AppError> {
        let presented = bearer_token(authorization)?;

        let record = self
            .refresh_tokens
            .fetch(presented)
            .await
            .map_err(refresh_token_error)?;
        self.refresh_tokens
            .validate(&record)
            .map_err(refresh_token_error)?;

        let user = self
            .users
            .get_user_by_id(record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken(TokenRejection::UnknownSubject))?;

        let access_token = self
            .codec
            .issue(user.id, self.access_token_lifetime)
            .map_err(token_error)?;

        Ok((user.id, access_token))
    }

    /// Revoke a presented refresh token
    ///
    /// A token that never existed is reported as invalid.
    pub async fn revoke(&self, authorization: Option<&str>) -> Result<(), AppError> {
        let context = ErrorContext::new("revoke");
        let result = self.revoke_inner(authorization).await;
        match &result {
            Ok(user_id) => tracing::info!(
                request_id = %context.request_id,
                user_id = %user_id,
                "Refresh token revoked"
            ),
            Err(e) => context.log_error(e),
        }
        result.map(|_| ())
    }

    async fn revoke_inner(&self, authorization: Option<&str>) -> Result<Uuid, AppError> {
        let presented = bearer_token(authorization)?;

        let record = self
            .refresh_tokens
            .fetch(presented)
            .await
            .map_err(refresh_token_error)?;
        self.refresh_tokens
            .revoke(presented)
            .await
            .map_err(refresh_token_error)?;

        Ok(record.user_id)
    }

    /// Verify a presented access token and return its subject
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Uuid, AppError> {
        let presented = bearer_token(authorization)?;
        self.codec.verify(presented).map_err(token_error)
    }

    /// Replace the acting user's email and password
    pub async fn update_credentials(
        &self,
        authorization: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let mut context = ErrorContext::new("update_credentials");
        let result = match self.authenticate(authorization) {
            Ok(user_id) => {
                context = context.with_user_id(user_id.to_string());
                self.update_credentials_inner(user_id, email, password).await
            }
            Err(e) => Err(e),
        };
        match &result {
            Ok(user) => tracing::info!(
                request_id = %context.request_id,
                user_id = %user.id,
                "Credentials updated"
            ),
            Err(e) => context.log_error(e),
        }
        result
    }

    async fn update_credentials_inner(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let email = is_valid_email(required(email, "email")?)?;
        let password = is_valid_password(required(password, "password")?)?;

        let hashed_password = self.hash_password(password).await?;

        self.users
            .update_user(
                user_id,
                NewUser {
                    email,
                    hashed_password,
                },
            )
            .await
            .map_err(conflict_on_duplicate)?
            .ok_or_else(|| AuthError::InvalidToken(TokenRejection::UnknownSubject).into())
    }

    // bcrypt is CPU-bound; keep it off the async workers.
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DependencyError::Hashing(e.to_string()))?
            .map_err(hash_error)
    }

    async fn verify_password(&self, password: &str, hashed: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hashed = hashed.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hashed))
            .await
            .map_err(|e| DependencyError::Hashing(e.to_string()))?
            .map_err(hash_error)
    }

    async fn burn_verification(&self, password: &str) {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let _ = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await;
    }
}

fn hash_error(err: HashError) -> AppError {
    DependencyError::Hashing(err.to_string()).into()
}

fn token_error(err: TokenError) -> AppError {
    let rejection = match err {
        TokenError::Signing(msg) => return DependencyError::Signing(msg).into(),
        TokenError::InvalidSignature => TokenRejection::InvalidSignature,
        TokenError::Expired => TokenRejection::Expired,
        TokenError::Malformed => TokenRejection::Malformed,
        TokenError::WrongAlgorithm => TokenRejection::WrongAlgorithm,
        TokenError::InvalidIssuer => TokenRejection::InvalidIssuer,
    };
    AuthError::InvalidToken(rejection).into()
}

fn refresh_token_error(err: RefreshTokenError) -> AppError {
    let rejection = match err {
        RefreshTokenError::NotFound => TokenRejection::NotFound,
        RefreshTokenError::Expired => TokenRejection::Expired,
        RefreshTokenError::Revoked => TokenRejection::Revoked,
        RefreshTokenError::Entropy(msg) => return DependencyError::Entropy(msg).into(),
        RefreshTokenError::Storage(e) => return e.into(),
    };
    AuthError::InvalidToken(rejection).into()
}

fn conflict_on_duplicate(err: StorageError) -> AppError {
    match err {
        StorageError::UniqueConstraintViolation(_) => {
            AppError::Conflict("Email already registered".to_string())
        }
        other => other.into(),
    }
}
