//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors from the password subsystem.
///
/// These never carry password material, only the underlying algorithm
/// error text.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Stored password hash is malformed: {0}")]
    Malformed(String),
}

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::Hash(format!("create argon2 params: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password using Argon2 with the given parameters, or secure
/// defaults if `None`.
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(format!("hash string: {e}")))?;

    Ok(hash.to_string())
}

/// Hash a password using Argon2 with default secure parameters.
pub fn hash_string(input: &str) -> Result<String, PasswordError> {
    hash_string_with_params(input, None)
}

/// Verify a password against a PHC-format hash.
///
/// Note: Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| PasswordError::Malformed(format!("parse hash: {e}")))?;

    // Verification always uses params from the hash
    let argon2 = Argon2::default();
    Ok(argon2.verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// A stored password: a PHC-format Argon2id hash plus an optional expiry.
///
/// The cleartext password is never stored. An expired record still verifies;
/// expiry is the login flow's concern, checked against the command clock via
/// [`is_expired`](PasswordRecord::is_expired).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub hash: String,
    pub expires: Option<DateTime<Utc>>,
}

impl PasswordRecord {
    /// Hashes `password` into a non-expiring record.
    pub fn new(password: &str) -> Result<Self, PasswordError> {
        Ok(Self {
            hash: hash_string(password)?,
            expires: None,
        })
    }

    /// Hashes `password` into a record that expires at the given time.
    pub fn expiring(password: &str, expires: DateTime<Utc>) -> Result<Self, PasswordError> {
        Ok(Self {
            hash: hash_string(password)?,
            expires: Some(expires),
        })
    }

    /// Whether `password` matches this record's hash.
    ///
    /// This is deliberately slow; call it through `spawn_blocking` from async
    /// code.
    pub fn verify(&self, password: &str) -> Result<bool, PasswordError> {
        verify_string(password, &self.hash)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hashing() {
        let input = "test_password_123";
        let hash = hash_string(input).unwrap();

        // Hash should not be empty
        assert!(!hash.is_empty());

        // Should verify correctly
        assert!(verify_string(input, &hash).unwrap());

        // Should fail with wrong input
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let input = "same_password";

        let hash1 = hash_string(input).unwrap();
        let hash2 = hash_string(input).unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(verify_string(input, &hash1).unwrap());
        assert!(verify_string(input, &hash2).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_string("anything", "not-a-phc-hash"),
            Err(PasswordError::Malformed(_))
        ));
    }

    #[test]
    fn test_record_round_trip() {
        let record = PasswordRecord::new("abcdefgh").unwrap();
        assert!(record.verify("abcdefgh").unwrap());
        assert!(!record.verify("abcdefgi").unwrap());
        assert!(record.hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_record_expiry() {
        let now = Utc::now();
        let permanent = PasswordRecord::new("pw").unwrap();
        assert!(!permanent.is_expired(now));
        assert!(!permanent.is_expired(DateTime::<Utc>::MAX_UTC));

        let expiring = PasswordRecord::expiring("pw", now).unwrap();
        assert!(expiring.is_expired(now));
        assert!(!expiring.is_expired(now - chrono::TimeDelta::seconds(1)));

        // Expiry does not affect verification itself
        assert!(expiring.verify("pw").unwrap());
    }
}
