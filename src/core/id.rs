//! Resource key identifier with validation
//!
//! Provides a validated [`ResourceKey`] newtype naming one protected backing
//! resource (e.g. a database). One credential is tracked per resource key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::ValidationError;

/// Maximum length for resource keys
const MAX_KEY_LENGTH: usize = 255;

/// Identifier of a protected backing resource (validated)
///
/// Only allows alphanumeric characters, hyphens, and underscores, so a key is
/// always safe to embed in administrative statements, log lines, and file
/// paths.
///
/// # Examples
///
/// ```
/// use keyrotor::ResourceKey;
///
/// let key = ResourceKey::new("orders-db").unwrap();
/// assert_eq!(key.as_str(), "orders-db");
///
/// assert!(ResourceKey::new("").is_err());
/// assert!(ResourceKey::new("../etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Creates a new validated resource key
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyResourceKey`] if the key is empty, or
    /// [`ValidationError::InvalidResourceKey`] if it exceeds 255 characters
    /// or contains characters other than alphanumeric, hyphens, underscores.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();

        if key.is_empty() {
            return Err(ValidationError::EmptyResourceKey);
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(ValidationError::InvalidResourceKey {
                key,
                reason: format!("exceeds maximum length of {MAX_KEY_LENGTH} characters"),
            });
        }

        if !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidResourceKey {
                key,
                reason:
                    "contains invalid characters (only alphanumeric, hyphens, underscores allowed)"
                        .to_string(),
            });
        }

        Ok(Self(key))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts to an owned string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ResourceKey::new(s)
    }
}

impl TryFrom<&str> for ResourceKey {
    type Error = ValidationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ResourceKey::new(s)
    }
}
