//! Credential issuance against the backing resource
//!
//! [`CredentialIssuer`] is the only component allowed to mutate the backing
//! resource's real access credentials. The [`CredentialStore`] is merely its
//! bookkeeping of what it last successfully applied: generation and the
//! administrative apply happen first, and only a confirmed apply installs the
//! new credential.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::{
    AuthorityError, Credential, IssuanceError, IssuanceResult, ResourceKey, SecretString,
};
use crate::store::CredentialStore;

/// Administrative interface to the protected resource
///
/// `apply` performs the create-or-alter-login-equivalent action scoped to one
/// resource: after it returns `Ok`, the resource accepts the new
/// principal/secret pair. Implemented by the embedding application's data
/// access layer; consumed, not implemented, by this crate.
#[async_trait]
pub trait ResourceAuthority: Send + Sync {
    /// Creates or updates the resource's actual access principal/secret
    async fn apply(
        &self,
        resource_key: &ResourceKey,
        principal: &str,
        secret: &SecretString,
    ) -> Result<(), AuthorityError>;
}

/// Pluggable principal/secret generation policy
///
/// Implementations must produce a pair distinct from the currently-live
/// credential for the key; two consecutive rotations must never re-issue the
/// same principal/secret.
pub trait SecretPolicy: Send + Sync {
    /// Generates a new principal/secret pair for `resource_key`
    fn generate(
        &self,
        resource_key: &ResourceKey,
        current: Option<&Credential>,
    ) -> (String, SecretString);
}

/// Default policy: random alphanumeric principals and secrets
///
/// Principals are `<prefix>_<key>_<random>`, secrets are random alphanumeric
/// strings of the configured length. This is a placeholder policy; it makes
/// no cryptographic-strength claims and embedders with entropy requirements
/// should supply their own [`SecretPolicy`].
#[derive(Debug, Clone)]
pub struct RandomSecretPolicy {
    /// Prefix for generated principals
    pub principal_prefix: String,
    /// Length of generated secrets in characters
    pub secret_length: usize,
}

impl Default for RandomSecretPolicy {
    fn default() -> Self {
        Self {
            principal_prefix: "svc".to_string(),
            secret_length: 32,
        }
    }
}

fn random_token(length: usize) -> String {
    use rand::RngExt;
    use rand::distr::Alphanumeric;

    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

impl SecretPolicy for RandomSecretPolicy {
    fn generate(
        &self,
        resource_key: &ResourceKey,
        current: Option<&Credential>,
    ) -> (String, SecretString) {
        loop {
            let principal = format!(
                "{}_{}_{}",
                self.principal_prefix,
                resource_key,
                random_token(8)
            );
            let secret = SecretString::new(random_token(self.secret_length));

            // A collision with the live credential is vanishingly unlikely,
            // but the contract is "distinct", so check anyway.
            let collides = current.is_some_and(|live| {
                live.principal() == principal || *live.secret() == secret
            });
            if !collides {
                return (principal, secret);
            }
        }
    }
}

/// Generates new credentials, applies them to the resource, and installs them
///
/// Deliberately not idempotent: every call is a rotation that produces a new
/// credential and one authority call.
pub struct CredentialIssuer {
    authority: Arc<dyn ResourceAuthority>,
    policy: Arc<dyn SecretPolicy>,
    store: Arc<CredentialStore>,
}

impl CredentialIssuer {
    /// Creates an issuer over the given authority, policy, and store
    pub fn new(
        authority: Arc<dyn ResourceAuthority>,
        policy: Arc<dyn SecretPolicy>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            authority,
            policy,
            store,
        }
    }

    /// The store this issuer installs into
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Issues a new credential for `resource_key` and installs it
    ///
    /// Generates a principal/secret pair distinct from the live credential,
    /// applies it through the [`ResourceAuthority`], and only on success
    /// installs the new credential (evicting whatever was previously live for
    /// the key). On failure the store is left untouched — the old credential
    /// remains live — and the error is propagated.
    ///
    /// No store lock is held across the authority call; a slow administrative
    /// call never blocks unrelated resource keys.
    pub async fn issue_and_install(
        &self,
        resource_key: &ResourceKey,
    ) -> IssuanceResult<Arc<Credential>> {
        let current = self.store.get(resource_key);
        let (principal, secret) = self
            .policy
            .generate(resource_key, current.as_deref());

        info!(
            resource_key = %resource_key,
            principal = %principal,
            "Issuing new credential"
        );

        if let Err(source) = self
            .authority
            .apply(resource_key, &principal, &secret)
            .await
        {
            error!(
                resource_key = %resource_key,
                error = %source,
                "Authority refused new credential; previous credential stays live"
            );
            return Err(IssuanceError::Authority {
                resource_key: resource_key.clone(),
                source,
            });
        }

        let credential = Credential::new(resource_key.clone(), principal, secret);
        let installed = Arc::new(credential.clone());
        self.store.put(credential);

        info!(
            resource_key = %resource_key,
            principal = %installed.principal(),
            "New credential installed"
        );
        Ok(installed)
    }
}
