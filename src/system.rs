//! The wired credential system
//!
//! [`CredentialSystem`] is the explicit context object the embedding
//! application constructs once at process start and passes (or injects) into
//! everything that needs it. There is no process-wide singleton; tests build
//! isolated instances instead of sharing global state.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{
    Credential, CredentialInfo, ExecuteResult, IssuanceResult, ResourceKey, RotationError,
};
use crate::executor::{ExecutorConfig, OperationOutcome, ResilientExecutor};
use crate::issuer::{CredentialIssuer, RandomSecretPolicy, ResourceAuthority, SecretPolicy};
use crate::reauth::{DeclineReauthorizer, IssuerReauthorizer, Reauthorizer};
use crate::rotation::{RotationConfig, RotationScheduler};
use crate::store::CredentialStore;

/// Store, issuer, scheduler, and executor wired over one credential table
///
/// # Examples
///
/// ```no_run
/// use keyrotor::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(authority: Arc<dyn keyrotor::ResourceAuthority>) -> Result<(), Box<dyn std::error::Error>> {
/// let system = CredentialSystem::builder()
///     .authority(authority)
///     .build();
///
/// let key = ResourceKey::new("TestDB")?;
/// system.issue(&key).await?;
/// system.start_rotation(&key, RotationConfig::every(Duration::from_secs(3600)))?;
///
/// let result = system
///     .run(&key, |credential| async move {
///         // execute the named procedure with `credential`
///         OperationOutcome::Success(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CredentialSystem {
    store: Arc<CredentialStore>,
    issuer: Arc<CredentialIssuer>,
    scheduler: RotationScheduler,
    executor: ResilientExecutor,
}

impl CredentialSystem {
    /// Create a builder for constructing a system instance
    pub fn builder() -> CredentialSystemBuilder<No> {
        CredentialSystemBuilder::new()
    }

    /// Installs a credential directly (operator/test tooling)
    ///
    /// Production installs flow through [`issue`](Self::issue), which applies
    /// the pair to the backing resource first.
    pub fn add_credential(&self, credential: Credential) -> Option<Arc<Credential>> {
        self.store.put(credential)
    }

    /// Withdraws the credential for `resource_key`
    ///
    /// Any rotation schedule for the key ceases at its next tick.
    pub fn remove_credential(&self, resource_key: &ResourceKey) -> Option<Arc<Credential>> {
        self.store.remove(resource_key)
    }

    /// Issues and installs a new credential for `resource_key`
    pub async fn issue(&self, resource_key: &ResourceKey) -> IssuanceResult<Arc<Credential>> {
        self.issuer.issue_and_install(resource_key).await
    }

    /// Arms periodic rotation for `resource_key`
    pub fn start_rotation(
        &self,
        resource_key: &ResourceKey,
        config: RotationConfig,
    ) -> Result<(), RotationError> {
        self.scheduler.start_rotation(resource_key, config)
    }

    /// Cancels the rotation schedule for `resource_key` (no-op when absent)
    pub fn stop_rotation(&self, resource_key: &ResourceKey) -> bool {
        self.scheduler.stop_rotation(resource_key)
    }

    /// Cancels every rotation schedule
    pub fn shutdown_rotation(&self) {
        self.scheduler.shutdown();
    }

    /// Runs `operation` under the configured retry policy
    pub async fn run<T, F, Fut>(
        &self,
        resource_key: &ResourceKey,
        operation: F,
    ) -> ExecuteResult<T>
    where
        F: FnMut(Arc<Credential>) -> Fut,
        Fut: Future<Output = OperationOutcome<T>>,
    {
        self.executor.run(resource_key, operation).await
    }

    /// Runs `operation` with an explicit attempt budget
    pub async fn run_with_attempts<T, F, Fut>(
        &self,
        resource_key: &ResourceKey,
        operation: F,
        max_attempts: u32,
    ) -> ExecuteResult<T>
    where
        F: FnMut(Arc<Credential>) -> Fut,
        Fut: Future<Output = OperationOutcome<T>>,
    {
        self.executor
            .run_with_attempts(resource_key, operation, max_attempts)
            .await
    }

    /// Diagnostic view of every live credential (secrets never included)
    pub fn snapshot(&self) -> Vec<CredentialInfo> {
        self.store.snapshot()
    }

    /// The shared credential table
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// The issuer (e.g. for wiring an
    /// [`IssuerReauthorizer`](crate::reauth::IssuerReauthorizer))
    pub fn issuer(&self) -> &Arc<CredentialIssuer> {
        &self.issuer
    }

    /// The rotation scheduler
    pub fn scheduler(&self) -> &RotationScheduler {
        &self.scheduler
    }

    /// The retry executor
    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }
}

// Type-level markers for builder typestate pattern
#[doc(hidden)]
pub struct Yes;
#[doc(hidden)]
pub struct No;

/// Builder for [`CredentialSystem`] with typestate pattern
///
/// Ensures the required resource authority is provided at compile time;
/// everything else has a default (random secret policy, decline-all
/// reauthorization, three attempts).
///
/// # Examples
///
/// ```no_run
/// use keyrotor::prelude::*;
/// use std::sync::Arc;
///
/// # fn example(authority: Arc<dyn keyrotor::ResourceAuthority>,
/// #            requestor: Arc<dyn keyrotor::Reauthorizer>) {
/// let system = CredentialSystem::builder()
///     .authority(authority)
///     .reauthorizer(requestor)
///     .executor_config(ExecutorConfig::default())
///     .build();
/// # }
/// ```
pub struct CredentialSystemBuilder<HasAuthority> {
    authority: Option<Arc<dyn ResourceAuthority>>,
    policy: Option<Arc<dyn SecretPolicy>>,
    reauth: ReauthChoice,
    executor_config: Option<ExecutorConfig>,
    _marker: PhantomData<HasAuthority>,
}

/// How the built executor answers reauthorization requests
enum ReauthChoice {
    /// Decline everything (nothing registered)
    Decline,
    /// Use the supplied requestor
    Provided(Arc<dyn Reauthorizer>),
    /// Rotate through the system's own issuer
    ViaIssuer,
}

impl CredentialSystemBuilder<No> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            authority: None,
            policy: None,
            reauth: ReauthChoice::Decline,
            executor_config: None,
            _marker: PhantomData,
        }
    }

    /// Set the resource authority (required)
    pub fn authority(
        self,
        authority: Arc<dyn ResourceAuthority>,
    ) -> CredentialSystemBuilder<Yes> {
        CredentialSystemBuilder {
            authority: Some(authority),
            policy: self.policy,
            reauth: self.reauth,
            executor_config: self.executor_config,
            _marker: PhantomData,
        }
    }
}

impl<S> CredentialSystemBuilder<S> {
    /// Set the principal/secret generation policy (optional)
    pub fn secret_policy(mut self, policy: Arc<dyn SecretPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the reauthorization requestor (optional; declines by default)
    pub fn reauthorizer(mut self, reauthorizer: Arc<dyn Reauthorizer>) -> Self {
        self.reauth = ReauthChoice::Provided(reauthorizer);
        self
    }

    /// Answer reauthorization requests by rotating through the system's own
    /// issuer (shorthand for wiring an
    /// [`IssuerReauthorizer`](crate::reauth::IssuerReauthorizer))
    pub fn reauthorize_via_issuer(mut self) -> Self {
        self.reauth = ReauthChoice::ViaIssuer;
        self
    }

    /// Set the executor configuration (optional)
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = Some(config);
        self
    }
}

impl CredentialSystemBuilder<Yes> {
    /// Build the wired system
    pub fn build(self) -> CredentialSystem {
        let store = Arc::new(CredentialStore::new());
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(RandomSecretPolicy::default()));
        let config = self.executor_config.unwrap_or_default();

        let authority = self.authority.expect("typestate guarantees authority");
        let issuer = Arc::new(CredentialIssuer::new(authority, policy, Arc::clone(&store)));
        let reauthorizer: Arc<dyn Reauthorizer> = match self.reauth {
            ReauthChoice::Decline => Arc::new(DeclineReauthorizer),
            ReauthChoice::Provided(reauthorizer) => reauthorizer,
            ReauthChoice::ViaIssuer => Arc::new(IssuerReauthorizer::new(Arc::clone(&issuer))),
        };
        let scheduler = RotationScheduler::new(Arc::clone(&issuer));
        let executor = ResilientExecutor::new(Arc::clone(&store), reauthorizer, config);

        CredentialSystem {
            store,
            issuer,
            scheduler,
            executor,
        }
    }
}

impl Default for CredentialSystemBuilder<No> {
    fn default() -> Self {
        Self::new()
    }
}
