/// Password Hashing and Verification
///
/// bcrypt with a configurable work factor. The hash string embeds its own cost
/// and salt, so raising the cost never invalidates stored credentials.

use bcrypt::{hash, verify};
use std::fmt;

use crate::validators::MAX_PASSWORD_BYTES;

/// Errors from the credential hasher
#[derive(Debug)]
pub enum HashError {
    /// Salt generation, encoding, or an unusable cost
    Hashing(String),
    /// The stored credential is not a bcrypt string
    InvalidHash(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::Hashing(msg) => write!(f, "Password hashing failed: {}", msg),
            HashError::InvalidHash(msg) => write!(f, "Stored hash is unusable: {}", msg),
        }
    }
}

impl std::error::Error for HashError {}

/// One-way salted credential hasher
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the account is unknown, so both login paths pay one bcrypt round
    dummy_hash: String,
}

impl PasswordHasher {
    /// # Errors
    /// Returns `HashError::Hashing` if `cost` is outside bcrypt's 4..=31 range
    pub fn new(cost: u32) -> Result<Self, HashError> {
        let dummy_hash = hash("chirpy-dummy-credential", cost)
            .map_err(|e| HashError::Hashing(e.to_string()))?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh salt
    ///
    /// bcrypt reads only the first 72 bytes, so longer input is refused
    /// rather than truncated.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::Hashing(format!(
                "password exceeds {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }
        hash(password, self.cost).map_err(|e| HashError::Hashing(e.to_string()))
    }

    /// Verify a password against its stored hash
    ///
    /// The comparison inside bcrypt is constant time. Input over 72 bytes
    /// can never match, since no such password could have been hashed.
    pub fn verify(&self, password: &str, hashed: &str) -> Result<bool, HashError> {
        if password.len() > MAX_PASSWORD_BYTES {
            self.verify_dummy(password);
            return Ok(false);
        }
        verify(password, hashed).map_err(|e| HashError::InvalidHash(e.to_string()))
    }

    /// Spend one verification without a real credential
    pub fn verify_dummy(&self, password: &str) {
        let _ = verify(password, &self.dummy_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(TEST_COST).expect("Failed to build hasher")
    }

    #[test]
    fn test_hash_password() {
        let password = "secret1";
        let hashed = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hashed);
        assert!(hashed.starts_with("$2"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash("secret1").unwrap();
        let second = hasher.hash("secret1").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("secret1", &first).unwrap());
        assert!(hasher.verify("secret1", &second).unwrap());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = hasher();
        let hashed = hasher.hash("secret1").unwrap();

        let samples = ["secret2", "Secret1", "secret", "secret1 ", ""];
        for wrong in samples {
            assert!(!hasher.verify(wrong, &hashed).unwrap(), "accepted {:?}", wrong);
        }
    }

    #[test]
    fn test_old_hashes_survive_cost_change() {
        let old = PasswordHasher::new(TEST_COST).unwrap();
        let hashed = old.hash("secret1").unwrap();

        let new = PasswordHasher::new(TEST_COST + 1).unwrap();
        assert!(new.verify("secret1", &hashed).unwrap());
        assert!(new.hash("secret1").unwrap().contains("$05$"));
    }

    #[test]
    fn test_long_passwords_are_not_truncated() {
        let hasher = hasher();
        let base = "a".repeat(MAX_PASSWORD_BYTES);

        assert!(matches!(
            hasher.hash(&format!("{}X", base)),
            Err(HashError::Hashing(_))
        ));

        let hashed = hasher.hash(&base).unwrap();
        assert!(hasher.verify(&base, &hashed).unwrap());
        assert!(!hasher.verify(&format!("{}Y", base), &hashed).unwrap());
        assert!(!hasher.verify(&format!("{}DIFFERENT", base), &hashed).unwrap());
    }

    #[test]
    fn test_invalid_stored_hash() {
        let result = hasher().verify("secret1", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(HashError::InvalidHash(_))));
    }

    #[test]
    fn test_cost_out_of_range() {
        assert!(matches!(PasswordHasher::new(3), Err(HashError::Hashing(_))));
    }
}
