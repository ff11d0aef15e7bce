use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use super::{authorization_header, CredentialsRequest};
use crate::auth::SessionService;
use crate::error::AppError;
use crate::storage::User;

/// Public view of a user; never carries the credential hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// POST /api/users
///
/// # Errors
/// - 400: Missing or malformed email/password
/// - 409: Email already registered
pub async fn create_user(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let user = sessions
        .register(form.email.as_deref(), form.password.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// PUT /api/users
///
/// Requires `Authorization: Bearer <access_token>`; replaces the caller's
/// email and password.
pub async fn update_user(
    req: HttpRequest,
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let user = sessions
        .update_credentials(
            authorization_header(&req),
            form.email.as_deref(),
            form.password.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
