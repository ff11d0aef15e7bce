/// Access Token Codec
///
/// Issues and verifies HS256 JWTs. Verification is stateless: signature,
/// pinned algorithm, issuer and expiry are all that decide validity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The secret is unusable or encoding failed
    Signing(String),
    InvalidSignature,
    Expired,
    Malformed,
    WrongAlgorithm,
    InvalidIssuer,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
            TokenError::InvalidSignature => write!(f, "Token signature does not match"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::Malformed => write!(f, "Token is malformed"),
            TokenError::WrongAlgorithm => write!(f, "Token declares an unexpected algorithm"),
            TokenError::InvalidIssuer => write!(f, "Token issuer does not match"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::WrongAlgorithm
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies access tokens with one process-wide secret
pub struct AccessTokenCodec {
    secret: SecretString,
    issuer: String,
}

impl AccessTokenCodec {
    pub fn new(secret: SecretString, issuer: impl Into<String>) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(SecretString::from(settings.secret.clone()), settings.issuer.clone())
    }

    /// Issue a token for `subject` valid for `lifetime` from now
    pub fn issue(&self, subject: Uuid, lifetime: Duration) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now(), lifetime)
    }

    pub fn issue_at(
        &self,
        subject: Uuid,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        let claims = Claims::new(subject, &self.issuer, issued_at, lifetime);

        encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let secret = self.secret.expose_secret();
        // Anyone can MAC with an empty key
        if secret.is_empty() {
            return Err(TokenError::InvalidSignature);
        }

        reject_foreign_algorithm(token)?;

        // Pinned: a token naming any other algorithm fails before its MAC is checked
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // Expiry is checked below against `now` with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(TokenError::from)?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        claims.user_id().ok_or(TokenError::Malformed)
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

// `jsonwebtoken` cannot parse names outside its `Algorithm` enum (`none`),
// so the declared algorithm is read from the raw header first.
fn reject_foreign_algorithm(token: &str) -> Result<(), TokenError> {
    let Some((header, _)) = token.split_once('.') else {
        return Ok(());
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(header) else {
        return Ok(());
    };
    match serde_json::from_slice::<RawHeader>(&bytes) {
        Ok(raw) if raw.alg != "HS256" => Err(TokenError::WrongAlgorithm),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn codec_with(secret: &str) -> AccessTokenCodec {
        AccessTokenCodec::new(SecretString::from(secret.to_string()), "Chirpy")
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec_with(SECRET);
        let user_id = Uuid::new_v4();

        let token = codec.issue(user_id, Duration::hours(1)).expect("Failed to issue token");
        let subject = codec.verify(&token).expect("Failed to verify token");

        assert_eq!(subject, user_id);
    }

    #[test]
    fn test_valid_until_expiry_then_expired() {
        let codec = codec_with(SECRET);
        let user_id = Uuid::new_v4();
        let token = codec.issue_at(user_id, issued_at(), Duration::hours(1)).unwrap();

        assert_eq!(codec.verify_at(&token, issued_at()).unwrap(), user_id);
        assert_eq!(
            codec.verify_at(&token, issued_at() + Duration::seconds(3599)).unwrap(),
            user_id
        );
        assert_eq!(
            codec.verify_at(&token, issued_at() + Duration::hours(1)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            codec.verify_at(&token, issued_at() + Duration::days(2)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = codec_with(SECRET).issue(Uuid::new_v4(), Duration::hours(1)).unwrap();

        let result = codec_with("another-secret-entirely").verify(&token);
        assert_eq!(result, Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_swapped_payload_is_invalid_signature() {
        let codec = codec_with(SECRET);
        let victim = codec.issue(Uuid::new_v4(), Duration::hours(1)).unwrap();
        let attacker = codec.issue(Uuid::new_v4(), Duration::hours(1)).unwrap();

        let victim_parts: Vec<&str> = victim.split('.').collect();
        let attacker_parts: Vec<&str> = attacker.split('.').collect();
        let forged = format!("{}.{}.{}", victim_parts[0], attacker_parts[1], victim_parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "Chirpy", Utc::now(), Duration::hours(1));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec_with(SECRET).verify(&token), Err(TokenError::WrongAlgorithm));

        let payload = token.split('.').nth(1).unwrap();
        for alg in ["none", "None", "RS256"] {
            let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"{}","typ":"JWT"}}"#, alg));
            let unsigned = format!("{}.{}.", header, payload);
            assert_eq!(
                codec_with(SECRET).verify(&unsigned),
                Err(TokenError::WrongAlgorithm),
                "alg {:?}",
                alg
            );
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec_with(SECRET);

        for token in ["", "invalid", "invalid.token.here", "a.b"] {
            assert_eq!(codec.verify(token), Err(TokenError::Malformed), "token {:?}", token);
        }
    }

    #[test]
    fn test_non_uuid_subject_is_malformed() {
        let mut claims = Claims::new(Uuid::new_v4(), "Chirpy", Utc::now(), Duration::hours(1));
        claims.sub = "not-a-uuid".to_string();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec_with(SECRET).verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = AccessTokenCodec::new(SecretString::from(SECRET.to_string()), "Elsewhere")
            .issue(Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        assert_eq!(codec_with(SECRET).verify(&token), Err(TokenError::InvalidIssuer));
    }

    #[test]
    fn test_empty_secret_cannot_verify() {
        let claims = Claims::new(Uuid::new_v4(), "Chirpy", Utc::now(), Duration::hours(1));
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b""),
        )
        .unwrap();

        assert_eq!(codec_with("").verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_empty_secret_cannot_sign() {
        let result = codec_with("").issue(Uuid::new_v4(), Duration::hours(1));
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }
}
