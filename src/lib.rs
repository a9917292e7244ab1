//! Keyrotor - Credential rotation and resilient execution
//!
//! Issues short-lived access credentials for independently keyed backing
//! resources (one live credential per resource key), rotates them on a
//! schedule without service interruption, and wraps resource operations in a
//! bounded retry loop that can reauthorize mid-operation when a credential is
//! rejected.
//!
//! # Features
//!
//! - **One live credential per key** - atomic replace, never a torn read
//! - **Periodic rotation** - cancellable per-key loop tasks, failures never
//!   stop the schedule
//! - **Bounded retries** - auth failures reauthorize exactly once each;
//!   other failures surface immediately
//! - **Explicit wiring** - no global state; a [`CredentialSystem`] is built
//!   once and injected
//! - **Secret hygiene** - secrets are zeroized on drop and absent from
//!   snapshots and serde
#![forbid(unsafe_code)]

/// Core types, errors, and primitives
pub mod core;
/// Bounded-retry execution and outcome classification
pub mod executor;
/// Credential issuance against the backing resource
pub mod issuer;
/// Reauthorization request path
pub mod reauth;
/// Periodic rotation scheduling
pub mod rotation;
/// Thread-safe keyed credential table
pub mod store;
/// The wired context object and its builder
pub mod system;

// ── Root re-exports ─────────────────────────────────────────────────────────
// Commonly-used types available directly as `keyrotor::TypeName`.

// Core types & errors
pub use crate::core::{
    AuthorityError, Credential, CredentialInfo, ExecuteError, ExecuteResult, IssuanceError,
    IssuanceResult, ReauthFailure, ResourceKey, RotationError, SecretString, ValidationError,
};

// Components
pub use crate::executor::{
    BlockingExecutor, ExecutorConfig, OperationFailure, OperationOutcome, ResilientExecutor,
};
pub use crate::issuer::{CredentialIssuer, RandomSecretPolicy, ResourceAuthority, SecretPolicy};
pub use crate::reauth::{
    AuthorizationRequest, ChannelReauthorizer, DeclineReauthorizer, IssuerReauthorizer,
    Reauthorizer,
};
pub use crate::rotation::{RotationConfig, RotationScheduler};
pub use crate::store::CredentialStore;
pub use crate::system::{CredentialSystem, CredentialSystemBuilder};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::core::{
        Credential, CredentialInfo, ExecuteError, IssuanceError, ResourceKey, RotationError,
        SecretString,
    };
    pub use crate::executor::{
        ExecutorConfig, OperationFailure, OperationOutcome, ResilientExecutor,
    };
    pub use crate::issuer::{CredentialIssuer, ResourceAuthority, SecretPolicy};
    pub use crate::reauth::{DeclineReauthorizer, Reauthorizer};
    pub use crate::rotation::{RotationConfig, RotationScheduler};
    pub use crate::store::CredentialStore;
    pub use crate::system::CredentialSystem;
}
