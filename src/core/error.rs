//! Error taxonomy for credential lifecycle and resilient execution
//!
//! Every failure that can reach a caller is one of the typed errors in this
//! module; recoverable internal states (a single failed rotation tick, a
//! declined reauthorization that still has retry budget) are absorbed and
//! logged where they occur.

use thiserror::Error;

use crate::core::id::ResourceKey;
use crate::executor::OperationFailure;

/// Validation failures for identifiers
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Resource key is empty
    #[error("resource key cannot be empty")]
    EmptyResourceKey,

    /// Resource key contains invalid characters or is too long
    #[error("invalid resource key {key:?}: {reason}")]
    InvalidResourceKey { key: String, reason: String },
}

/// Errors reported by a [`ResourceAuthority`](crate::issuer::ResourceAuthority)
/// when applying new credentials to the backing resource
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The administrative call ran but the resource refused the new
    /// principal/secret (non-success code)
    #[error("authority rejected new credentials: {message}")]
    Rejected { message: String },

    /// The authority could not be reached at all
    #[error("authority unreachable: {message}")]
    Unreachable { message: String },
}

/// Errors during credential issuance and installation
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The resource authority rejected the new credentials or could not be
    /// reached; the previously-live credential remains installed
    #[error("issuance failed for {resource_key}")]
    Authority {
        resource_key: ResourceKey,
        #[source]
        source: AuthorityError,
    },
}

impl IssuanceError {
    /// Resource key the failed issuance was for
    pub fn resource_key(&self) -> &ResourceKey {
        match self {
            Self::Authority { resource_key, .. } => resource_key,
        }
    }
}

/// Errors from rotation scheduling
#[derive(Debug, Clone, Error)]
pub enum RotationError {
    /// Rotation requested for a key with no installed credential
    #[error("no credential installed for {resource_key}; nothing to rotate")]
    NoCredential { resource_key: ResourceKey },

    /// Rotation requested with a zero interval, which would rotate
    /// back-to-back with no pause between authority calls
    #[error("rotation interval for {resource_key} must be non-zero")]
    ZeroInterval { resource_key: ResourceKey },
}

/// Why a reauthorization request produced no replacement credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthFailure {
    /// The registered requestor answered "declined"
    Declined,
    /// No answer arrived within the configured reauthorization timeout
    TimedOut,
}

impl std::fmt::Display for ReauthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declined => write!(f, "declined"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Errors surfaced by [`ResilientExecutor::run`](crate::executor::ResilientExecutor::run)
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Operation requested for a key with no installed credential.
    /// Not retried; surfaced immediately.
    #[error("no credential installed for {resource_key}")]
    NoCredential { resource_key: ResourceKey },

    /// The external authority declined or timed out when asked for a fresh
    /// credential mid-retry. The stale credential remains live in the store
    /// since no replacement was confirmed.
    #[error("reauthorization for {resource_key} {reason}")]
    ReauthorizationFailed {
        resource_key: ResourceKey,
        reason: ReauthFailure,
    },

    /// A non-authentication failure from the wrapped operation. Never
    /// retried; retrying cannot change the outcome.
    #[error("operation against {resource_key} failed")]
    Operation {
        resource_key: ResourceKey,
        #[source]
        failure: OperationFailure,
    },

    /// Attempt budget consumed without success; the last underlying
    /// authentication failure is attached as cause.
    #[error("retries exhausted after {attempts} attempts against {resource_key}")]
    RetriesExhausted {
        resource_key: ResourceKey,
        attempts: u32,
        #[source]
        last_failure: OperationFailure,
    },
}

/// Result type for issuance operations
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Result type for executor operations
pub type ExecuteResult<T> = Result<T, ExecuteError>;
