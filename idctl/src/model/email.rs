//! Validated email addresses.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An email address, lowercased and shape-checked at construction.
///
/// Validation is deliberately loose: one `@` separating non-empty local and
/// domain parts, no whitespace, at most 255 characters. Deliverability is the
/// mail system's problem, not ours.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EmailAddress {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.len() > 255 {
            return Err(ValidationError::InvalidEmail(input.to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidEmail(input.to_string()));
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(ValidationError::InvalidEmail(input.to_string()));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ValidationError::InvalidEmail(input.to_string()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        let email: EmailAddress = "someone@example.com".parse().unwrap();
        assert_eq!(email.as_str(), "someone@example.com");
    }

    #[test]
    fn test_lowercases() {
        let email: EmailAddress = "Someone@Example.COM".parse().unwrap();
        assert_eq!(email.as_str(), "someone@example.com");
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        let email: EmailAddress = "  a@b.example  ".parse().unwrap();
        assert_eq!(email.as_str(), "a@b.example");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "no-at-sign", "@example.com", "someone@", "a@b@c", "with space@example.com"] {
            assert!(bad.parse::<EmailAddress>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_rejects_overlong() {
        let long = format!("{}@example.com", "a".repeat(300));
        assert!(long.parse::<EmailAddress>().is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: Result<EmailAddress, _> = serde_json::from_str("\"a@b.example\"");
        assert!(ok.is_ok());
        let bad: Result<EmailAddress, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
