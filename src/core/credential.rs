//! Credential value type and its diagnostic projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::id::ResourceKey;
use crate::core::secret::SecretString;

/// A principal/secret pair valid for one resource key
///
/// `Credential` is immutable once constructed: a rotation always produces a
/// new value, never a mutation of an old one. A superseded credential stays
/// usable by any operation already in flight with it (the store hands out
/// `Arc<Credential>`) until that operation completes or fails.
///
/// There is deliberately no `Serialize` impl; the secret must not leave the
/// process through serde. Use [`Credential::info`] for diagnostics.
///
/// # Examples
///
/// ```
/// use keyrotor::{Credential, ResourceKey};
///
/// let key = ResourceKey::new("TestDB")?;
/// let credential = Credential::new(key, "fredAstaire", "myPwd");
/// assert_eq!(credential.principal(), "fredAstaire");
/// assert_eq!(credential.secret().expose(), "myPwd");
/// # Ok::<(), keyrotor::ValidationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Credential {
    resource_key: ResourceKey,
    principal: String,
    secret: SecretString,
    issued_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential issued now
    pub fn new(
        resource_key: ResourceKey,
        principal: impl Into<String>,
        secret: impl Into<SecretString>,
    ) -> Self {
        Self {
            resource_key,
            principal: principal.into(),
            secret: secret.into(),
            issued_at: Utc::now(),
        }
    }

    /// Creates a credential with an explicit issue time
    pub fn issued_at(
        resource_key: ResourceKey,
        principal: impl Into<String>,
        secret: impl Into<SecretString>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_key,
            principal: principal.into(),
            secret: secret.into(),
            issued_at,
        }
    }

    /// Resource key this credential is valid for
    pub fn resource_key(&self) -> &ResourceKey {
        &self.resource_key
    }

    /// Principal (login/user name)
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Opaque secret
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// When this credential was issued
    pub fn issue_time(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Diagnostic projection of this credential (no secret)
    pub fn info(&self) -> CredentialInfo {
        CredentialInfo {
            resource_key: self.resource_key.clone(),
            principal: self.principal.clone(),
            issued_at: self.issued_at,
        }
    }
}

/// Diagnostic view of a live credential
///
/// The secret is structurally absent, so snapshots and serialized diagnostics
/// can never leak it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    /// Resource key the credential is valid for
    pub resource_key: ResourceKey,

    /// Principal (login/user name)
    pub principal: String,

    /// When the credential was issued
    pub issued_at: DateTime<Utc>,
}
