/// Session Routes
///
/// Login, access-token refresh, and refresh-token revocation.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use super::{authorization_header, CredentialsRequest};
use crate::auth::SessionService;
use crate::error::AppError;

/// Login response: the user plus both halves of the session
#[derive(Serialize)]
pub struct LoginResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// POST /api/login
///
/// # Errors
/// - 400: Missing or malformed email/password
/// - 401: Unknown email or wrong password (indistinguishable)
/// - 500: Internal server error
pub async fn login(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let outcome = sessions
        .login(form.email.as_deref(), form.password.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        id: outcome.user.id.to_string(),
        email: outcome.user.email,
        created_at: outcome.user.created_at.to_rfc3339(),
        updated_at: outcome.user.updated_at.to_rfc3339(),
        token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: sessions.access_token_lifetime().num_seconds(),
    }))
}

/// POST /api/refresh
///
/// Requires `Authorization: Bearer <refresh_token>`. Returns a new access
/// token; the refresh token stays as it was.
///
/// # Errors
/// - 401: Missing, unknown, expired, or revoked refresh token
/// - 500: Internal server error
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let token = sessions.refresh(authorization_header(&req)).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse { token }))
}

/// POST /api/revoke
///
/// Requires `Authorization: Bearer <refresh_token>`.
///
/// # Errors
/// - 401: Missing or unknown refresh token
/// - 500: Internal server error
pub async fn revoke(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    sessions.revoke(authorization_header(&req)).await?;

    Ok(HttpResponse::NoContent().finish())
}
