//! Core types, errors, and primitives

mod credential;
mod error;
mod id;
mod secret;

pub use credential::{Credential, CredentialInfo};
pub use error::{
    AuthorityError, ExecuteError, ExecuteResult, IssuanceError, IssuanceResult, ReauthFailure,
    RotationError, ValidationError,
};
pub use id::ResourceKey;
pub use secret::SecretString;
