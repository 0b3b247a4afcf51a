//! Validated login names.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A login name: 1 to 64 characters drawn from `[A-Za-z0-9_-]`.
///
/// Case is preserved as entered; lookups compare case-insensitively at the
/// store layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Idname(String);

impl Idname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Idname {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let valid = !input.is_empty()
            && input.len() <= 64
            && input.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(input.to_string()))
        } else {
            Err(ValidationError::InvalidIdname(input.to_string()))
        }
    }
}

impl TryFrom<String> for Idname {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Idname> for String {
    fn from(idname: Idname) -> Self {
        idname.0
    }
}

impl fmt::Display for Idname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
