//! Periodic credential rotation
//!
//! One cancellable loop task per resource key: sleep, rotate through the
//! issuer, re-arm. An explicit loop with a cancellation check each iteration
//! keeps cancellation and testing deterministic — there is no timer-callback
//! recursion to chase.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::{ResourceKey, RotationError};
use crate::issuer::CredentialIssuer;
use crate::store::CredentialStore;

/// Rotation schedule for one resource key
///
/// Durations serialize human-readably ("1h", "90d"). A zero `initial_delay`
/// means the first rotation happens after one full `interval`; the `interval`
/// itself must be non-zero ([`start_rotation`](RotationScheduler::start_rotation)
/// rejects it otherwise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Delay before the first rotation
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Interval between subsequent rotations
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl RotationConfig {
    /// Schedule with no extra delay before the first interval
    pub fn every(interval: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(24 * 3600),
        }
    }
}

struct ScheduleHandle {
    token: CancellationToken,
    generation: u64,
}

/// Runs a recurring rotation loop per resource key
///
/// Each loop communicates with the rest of the system exclusively through the
/// [`CredentialStore`]; no lock is ever held across the authority call, so a
/// slow administrative call cannot block unrelated resource keys.
///
/// # Examples
///
/// ```no_run
/// use keyrotor::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(issuer: Arc<keyrotor::CredentialIssuer>) -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = RotationScheduler::new(issuer);
/// let key = ResourceKey::new("TestDB")?;
///
/// scheduler.start_rotation(&key, RotationConfig::every(Duration::from_secs(3600)))?;
/// // ... later
/// scheduler.stop_rotation(&key);
/// # Ok(())
/// # }
/// ```
pub struct RotationScheduler {
    issuer: Arc<CredentialIssuer>,
    store: Arc<CredentialStore>,
    schedules: Arc<Mutex<HashMap<ResourceKey, ScheduleHandle>>>,
    generations: AtomicU64,
}

impl RotationScheduler {
    /// Creates a scheduler rotating through `issuer`
    pub fn new(issuer: Arc<CredentialIssuer>) -> Self {
        let store = Arc::clone(issuer.store());
        Self {
            issuer,
            store,
            schedules: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Arms a recurring rotation for `resource_key`
    ///
    /// Requires a live credential for the key (there is nothing to rotate
    /// otherwise). Starting an already-scheduled key cancels the previous
    /// loop and arms a new one with the given config. Rotation failures are
    /// logged and the schedule continues; a transient failure never
    /// permanently disables future rotation attempts.
    pub fn start_rotation(
        &self,
        resource_key: &ResourceKey,
        config: RotationConfig,
    ) -> Result<(), RotationError> {
        // A zero interval would rotate back-to-back with no pause between
        // authority calls.
        if config.interval.is_zero() {
            return Err(RotationError::ZeroInterval {
                resource_key: resource_key.clone(),
            });
        }

        if self.store.get(resource_key).is_none() {
            return Err(RotationError::NoCredential {
                resource_key: resource_key.clone(),
            });
        }

        let token = CancellationToken::new();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        {
            let mut schedules = self.schedules.lock();
            if let Some(previous) = schedules.insert(
                resource_key.clone(),
                ScheduleHandle {
                    token: token.clone(),
                    generation,
                },
            ) {
                debug!(
                    resource_key = %resource_key,
                    "Restarting rotation schedule"
                );
                previous.token.cancel();
            }
        }

        info!(
            resource_key = %resource_key,
            initial_delay = ?config.initial_delay,
            interval = ?config.interval,
            "Rotation scheduled"
        );

        tokio::spawn(rotation_loop(
            Arc::clone(&self.issuer),
            Arc::clone(&self.store),
            Arc::clone(&self.schedules),
            resource_key.clone(),
            config,
            token,
            generation,
        ));

        Ok(())
    }

    /// Cancels the rotation schedule for `resource_key`
    ///
    /// Safe to call when no schedule is armed (no-op, returns `false`) and
    /// safe concurrently with an in-flight rotation: that rotation completes
    /// and installs its result, but no further timer is armed.
    pub fn stop_rotation(&self, resource_key: &ResourceKey) -> bool {
        let handle = self.schedules.lock().remove(resource_key);
        match handle {
            Some(handle) => {
                handle.token.cancel();
                info!(resource_key = %resource_key, "Rotation stopped");
                true
            }
            None => false,
        }
    }

    /// Cancels every active rotation schedule
    pub fn shutdown(&self) {
        let handles: Vec<(ResourceKey, ScheduleHandle)> =
            self.schedules.lock().drain().collect();
        for (resource_key, handle) in handles {
            handle.token.cancel();
            debug!(resource_key = %resource_key, "Rotation cancelled at shutdown");
        }
    }

    /// Resource keys with an active rotation schedule, sorted
    pub fn active_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.schedules.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::too_many_arguments)]
async fn rotation_loop(
    issuer: Arc<CredentialIssuer>,
    store: Arc<CredentialStore>,
    schedules: Arc<Mutex<HashMap<ResourceKey, ScheduleHandle>>>,
    resource_key: ResourceKey,
    config: RotationConfig,
    token: CancellationToken,
    generation: u64,
) {
    // Zero initial delay means "first rotation after one full interval".
    let mut delay = if config.initial_delay.is_zero() {
        config.interval
    } else {
        config.initial_delay
    };

    loop {
        tokio::select! {
            () = sleep(delay) => {}
            () = token.cancelled() => {
                debug!(resource_key = %resource_key, "Rotation loop shutting down");
                return;
            }
        }

        // Withdrawn key: nothing left to rotate, the schedule ceases.
        if store.get(&resource_key).is_none() {
            info!(
                resource_key = %resource_key,
                "Credential withdrawn; rotation ceases"
            );
            deregister(&schedules, &resource_key, generation);
            return;
        }

        match issuer.issue_and_install(&resource_key).await {
            Ok(credential) => {
                info!(
                    resource_key = %resource_key,
                    principal = %credential.principal(),
                    "Periodic rotation completed"
                );
            }
            Err(e) => {
                error!(
                    resource_key = %resource_key,
                    error = %e,
                    "Periodic rotation failed; will retry at next interval"
                );
            }
        }

        // A stop issued while the rotation was in flight lets it finish and
        // install, but arms no further timer.
        if token.is_cancelled() {
            debug!(resource_key = %resource_key, "Rotation loop shutting down");
            return;
        }

        delay = config.interval;
    }
}

/// Removes this loop's registry entry unless a newer schedule replaced it
fn deregister(
    schedules: &Mutex<HashMap<ResourceKey, ScheduleHandle>>,
    resource_key: &ResourceKey,
    generation: u64,
) {
    let mut schedules = schedules.lock();
    if schedules
        .get(resource_key)
        .is_some_and(|handle| handle.generation == generation)
    {
        schedules.remove(resource_key);
    }
}
