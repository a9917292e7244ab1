//! Opaque secret string with drop hygiene
//!
//! [`SecretString`] never appears in `Debug`/`Display` output, compares in
//! constant time, and zeroizes its buffer on drop. It has no serde
//! implementations on purpose: secret material must not travel through
//! serializers.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// An opaque secret value
///
/// # Examples
///
/// ```
/// use keyrotor::SecretString;
///
/// let secret = SecretString::new("myPwd");
/// assert_eq!(secret.expose(), "myPwd");
/// assert_eq!(format!("{secret:?}"), "SecretString(***)");
/// ```
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wraps a secret value
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Explicit access to the secret value
    ///
    /// Call sites of `expose()` are the audit surface for secret handling;
    /// keep them few.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length of the secret in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
