/// Authentication module
///
/// Credential hashing, access token signing, refresh token storage, and the
/// session flows that compose them.

mod claims;
mod credentials;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::Claims;
pub use credentials::bearer_token;
pub use jwt::{AccessTokenCodec, TokenError};
pub use password::{HashError, PasswordHasher};
pub use refresh_token::{generate_refresh_token, RefreshTokenError, RefreshTokenStore};
pub use session::{LoginOutcome, SessionService};
