mod auth;
mod health_check;
mod users;

use actix_web::http::header;
use actix_web::HttpRequest;
use serde::Deserialize;

pub use auth::{login, refresh, revoke};
pub use health_check::health_check;
pub use users::{create_user, update_user};

/// Body shared by signup, login and credential update
///
/// Fields are optional so a missing one is reported by name instead of as a parse error.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn authorization_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}
