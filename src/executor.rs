//! Bounded-retry execution against a protected resource
//!
//! [`ResilientExecutor`] wraps an arbitrary operation, executes it with the
//! resource's current live credential, and on an authentication-class failure
//! raises a reauthorization request and retries with whatever fresh
//! credential the requestor supplies. Other failure classes are never
//! retried, and the attempt budget is never exceeded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::{
    Credential, ExecuteError, ExecuteResult, ReauthFailure, ResourceKey,
};
use crate::reauth::Reauthorizer;
use crate::store::CredentialStore;

/// A classified failure reported by a wrapped operation
///
/// `code` carries the backing resource's own error code when one exists (for
/// SQL-like resources, the login-failed class of codes is what callers map to
/// [`OperationOutcome::AuthFailure`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Resource-native error code, if any
    pub code: Option<i32>,
    /// Human-readable diagnostic
    pub message: String,
}

impl OperationFailure {
    /// Creates a failure with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Attaches the resource-native error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for OperationFailure {}

/// Outcome of one attempt of a wrapped operation
///
/// The retry decision is a pure data match on this tag; callers classify
/// their resource's errors once, at the operation boundary, instead of the
/// executor inspecting error types.
#[derive(Debug)]
pub enum OperationOutcome<T> {
    /// The operation succeeded
    Success(T),
    /// The resource rejected the credential (login-failed class); triggers
    /// the reauthorization path
    AuthFailure(OperationFailure),
    /// Any other failure; surfaced immediately, never retried
    OtherFailure(OperationFailure),
}

/// Executor configuration
///
/// Durations serialize human-readably ("30s", "1m").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Attempt budget per call (a zero budget is treated as one attempt)
    pub max_attempts: u32,

    /// How long to wait for a reauthorization answer before treating the
    /// request as "no new credential supplied"
    #[serde(with = "humantime_serde")]
    pub reauth_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            reauth_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry wrapper around operations on keyed resources
///
/// Cheap to clone; clones share the store and reauthorizer.
///
/// # Examples
///
/// ```no_run
/// use keyrotor::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let store = Arc::new(CredentialStore::new());
/// # let reauthorizer = Arc::new(DeclineReauthorizer);
/// let executor = ResilientExecutor::new(store, reauthorizer, ExecutorConfig::default());
/// let key = ResourceKey::new("TestDB")?;
///
/// let rows = executor
///     .run(&key, |credential| async move {
///         // connect with credential, run the procedure, classify the error
///         OperationOutcome::Success(42)
///     })
///     .await?;
/// assert_eq!(rows, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientExecutor {
    store: Arc<CredentialStore>,
    reauthorizer: Arc<dyn Reauthorizer>,
    config: ExecutorConfig,
}

impl ResilientExecutor {
    /// Creates an executor over the given store and reauthorization requestor
    pub fn new(
        store: Arc<CredentialStore>,
        reauthorizer: Arc<dyn Reauthorizer>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            reauthorizer,
            config,
        }
    }

    /// The store this executor reads credentials from
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Current configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs `operation` with the configured attempt budget
    pub async fn run<T, F, Fut>(
        &self,
        resource_key: &ResourceKey,
        operation: F,
    ) -> ExecuteResult<T>
    where
        F: FnMut(Arc<Credential>) -> Fut,
        Fut: Future<Output = OperationOutcome<T>>,
    {
        self.run_with_attempts(resource_key, operation, self.config.max_attempts)
            .await
    }

    /// Runs `operation` with an explicit attempt budget
    ///
    /// The operation is supplied the current live credential. On success the
    /// result is returned immediately. On an authentication failure with
    /// budget remaining, exactly one reauthorization request is raised; if a
    /// fresh credential is supplied it is adopted both locally and in the
    /// store (so concurrent callers for the same key stop using the stale
    /// one), and the operation is retried. A declined or timed-out request
    /// fails immediately with [`ExecuteError::ReauthorizationFailed`]. Any
    /// other failure class fails immediately with [`ExecuteError::Operation`]
    /// and is never retried. Exhausting the budget fails with
    /// [`ExecuteError::RetriesExhausted`] carrying the last failure.
    pub async fn run_with_attempts<T, F, Fut>(
        &self,
        resource_key: &ResourceKey,
        mut operation: F,
        max_attempts: u32,
    ) -> ExecuteResult<T>
    where
        F: FnMut(Arc<Credential>) -> Fut,
        Fut: Future<Output = OperationOutcome<T>>,
    {
        // A zero budget is treated as one attempt.
        let budget = max_attempts.max(1);

        let mut credential =
            self.store
                .get(resource_key)
                .ok_or_else(|| ExecuteError::NoCredential {
                    resource_key: resource_key.clone(),
                })?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(
                resource_key = %resource_key,
                attempt = attempts,
                max_attempts = budget,
                principal = %credential.principal(),
                "Executing operation"
            );

            match operation(Arc::clone(&credential)).await {
                OperationOutcome::Success(value) => {
                    debug!(
                        resource_key = %resource_key,
                        attempt = attempts,
                        "Operation succeeded"
                    );
                    return Ok(value);
                }
                OperationOutcome::AuthFailure(failure) => {
                    warn!(
                        resource_key = %resource_key,
                        attempt = attempts,
                        failure = %failure,
                        "Credential rejected by resource"
                    );

                    if attempts >= budget {
                        return Err(ExecuteError::RetriesExhausted {
                            resource_key: resource_key.clone(),
                            attempts,
                            last_failure: failure,
                        });
                    }

                    credential = self.reauthorize(resource_key, &failure).await?;
                }
                OperationOutcome::OtherFailure(failure) => {
                    warn!(
                        resource_key = %resource_key,
                        attempt = attempts,
                        failure = %failure,
                        "Operation failed (not retryable)"
                    );
                    return Err(ExecuteError::Operation {
                        resource_key: resource_key.clone(),
                        failure,
                    });
                }
            }
        }
    }

    /// Raises one reauthorization request and adopts the answer
    async fn reauthorize(
        &self,
        resource_key: &ResourceKey,
        last_failure: &OperationFailure,
    ) -> ExecuteResult<Arc<Credential>> {
        info!(
            resource_key = %resource_key,
            "Requesting reauthorization"
        );

        let answer = timeout(
            self.config.reauth_timeout,
            self.reauthorizer.reauthorize(resource_key, last_failure),
        )
        .await;

        match answer {
            Ok(Some(fresh)) => {
                info!(
                    resource_key = %resource_key,
                    principal = %fresh.principal(),
                    "Adopting fresh credential"
                );
                let fresh = Arc::new(fresh);
                // Write through so concurrent callers for the same key stop
                // using the stale credential too.
                self.store.put(Credential::clone(&fresh));
                Ok(fresh)
            }
            Ok(None) => {
                warn!(
                    resource_key = %resource_key,
                    "Reauthorization declined"
                );
                Err(ExecuteError::ReauthorizationFailed {
                    resource_key: resource_key.clone(),
                    reason: ReauthFailure::Declined,
                })
            }
            Err(_elapsed) => {
                warn!(
                    resource_key = %resource_key,
                    timeout = ?self.config.reauth_timeout,
                    "Reauthorization timed out"
                );
                Err(ExecuteError::ReauthorizationFailed {
                    resource_key: resource_key.clone(),
                    reason: ReauthFailure::TimedOut,
                })
            }
        }
    }
}

/// Synchronous facade over [`ResilientExecutor`]
///
/// For embedders without an async runtime; owns a current-thread tokio
/// runtime and drives the async path to completion. Must not be used from
/// inside an async context.
pub struct BlockingExecutor {
    inner: ResilientExecutor,
    runtime: tokio::runtime::Runtime,
}

impl BlockingExecutor {
    /// Wraps an executor in a private current-thread runtime
    pub fn new(inner: ResilientExecutor) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self { inner, runtime })
    }

    /// Synchronous variant of [`ResilientExecutor::run`]
    pub fn run<T, F>(&self, resource_key: &ResourceKey, mut operation: F) -> ExecuteResult<T>
    where
        F: FnMut(Arc<Credential>) -> OperationOutcome<T>,
    {
        self.runtime.block_on(
            self.inner
                .run(resource_key, |credential| {
                    let outcome = operation(credential);
                    async move { outcome }
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.reauth_timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_durations_serialize_human_readably() {
        let config = ExecutorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"30s\""), "got {json}");

        let parsed: ExecutorConfig =
            serde_json::from_str("{\"max_attempts\":5,\"reauth_timeout\":\"1m 30s\"}").unwrap();
        assert_eq!(parsed.max_attempts, 5);
        assert_eq!(parsed.reauth_timeout, Duration::from_secs(90));
    }

    #[test]
    fn operation_failure_display() {
        let plain = OperationFailure::new("connection reset");
        assert_eq!(plain.to_string(), "connection reset");

        let coded = OperationFailure::new("login failed for user").with_code(18456);
        assert_eq!(coded.to_string(), "login failed for user (code 18456)");
    }
}
